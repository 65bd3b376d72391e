// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! EVM instruction table.

pub type Instruction = u8;

pub const STOP: Instruction = 0x00;
pub const ADD: Instruction = 0x01;
pub const MUL: Instruction = 0x02;
pub const SUB: Instruction = 0x03;
pub const DIV: Instruction = 0x04;
pub const SDIV: Instruction = 0x05;
pub const MOD: Instruction = 0x06;
pub const SMOD: Instruction = 0x07;
pub const ADDMOD: Instruction = 0x08;
pub const MULMOD: Instruction = 0x09;
pub const EXP: Instruction = 0x0a;
pub const SIGNEXTEND: Instruction = 0x0b;

pub const LT: Instruction = 0x10;
pub const GT: Instruction = 0x11;
pub const SLT: Instruction = 0x12;
pub const SGT: Instruction = 0x13;
pub const EQ: Instruction = 0x14;
pub const ISZERO: Instruction = 0x15;
pub const AND: Instruction = 0x16;
pub const OR: Instruction = 0x17;
pub const XOR: Instruction = 0x18;
pub const NOT: Instruction = 0x19;
pub const BYTE: Instruction = 0x1a;
pub const SHL: Instruction = 0x1b;
pub const SHR: Instruction = 0x1c;
pub const SAR: Instruction = 0x1d;

pub const SHA3: Instruction = 0x20;

pub const ADDRESS: Instruction = 0x30;
pub const BALANCE: Instruction = 0x31;
pub const ORIGIN: Instruction = 0x32;
pub const CALLER: Instruction = 0x33;
pub const CALLVALUE: Instruction = 0x34;
pub const CALLDATALOAD: Instruction = 0x35;
pub const CALLDATASIZE: Instruction = 0x36;
pub const CALLDATACOPY: Instruction = 0x37;
pub const CODESIZE: Instruction = 0x38;
pub const CODECOPY: Instruction = 0x39;
pub const EXTCODESIZE: Instruction = 0x3b;
pub const EXTCODECOPY: Instruction = 0x3c;
pub const RETURNDATASIZE: Instruction = 0x3d;
pub const RETURNDATACOPY: Instruction = 0x3e;
pub const EXTCODEHASH: Instruction = 0x3f;

pub const BLOCKHASH: Instruction = 0x40;
pub const TIMESTAMP: Instruction = 0x42;
pub const NUMBER: Instruction = 0x43;
pub const CHAINID: Instruction = 0x46;
pub const SELFBALANCE: Instruction = 0x47;

pub const POP: Instruction = 0x50;
pub const MLOAD: Instruction = 0x51;
pub const MSTORE: Instruction = 0x52;
pub const MSTORE8: Instruction = 0x53;
pub const SLOAD: Instruction = 0x54;
pub const SSTORE: Instruction = 0x55;
pub const JUMP: Instruction = 0x56;
pub const JUMPI: Instruction = 0x57;
pub const PC: Instruction = 0x58;
pub const MSIZE: Instruction = 0x59;
pub const GAS: Instruction = 0x5a;
pub const JUMPDEST: Instruction = 0x5b;

pub const PUSH1: Instruction = 0x60;
pub const PUSH32: Instruction = 0x7f;
pub const DUP1: Instruction = 0x80;
pub const DUP16: Instruction = 0x8f;
pub const SWAP1: Instruction = 0x90;
pub const SWAP16: Instruction = 0x9f;
pub const LOG0: Instruction = 0xa0;
pub const LOG4: Instruction = 0xa4;

pub const CREATE: Instruction = 0xf0;
pub const CALL: Instruction = 0xf1;
pub const CALLCODE: Instruction = 0xf2;
pub const RETURN: Instruction = 0xf3;
pub const DELEGATECALL: Instruction = 0xf4;
pub const CREATE2: Instruction = 0xf5;
pub const STATICCALL: Instruction = 0xfa;
pub const REVERT: Instruction = 0xfd;
pub const INVALID: Instruction = 0xfe;
pub const SUICIDE: Instruction = 0xff;

/// Gas tier an instruction's base cost is drawn from.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GasPriceTier {
    Zero,
    Base,
    VeryLow,
    Low,
    Mid,
    High,
    Ext,
    /// Cost computed by the gasometer, not the tier table.
    Special,
}

impl GasPriceTier {
    pub fn idx(self) -> usize {
        match self {
            GasPriceTier::Zero => 0,
            GasPriceTier::Base => 1,
            GasPriceTier::VeryLow => 2,
            GasPriceTier::Low => 3,
            GasPriceTier::Mid => 4,
            GasPriceTier::High => 5,
            GasPriceTier::Ext => 6,
            GasPriceTier::Special => 7,
        }
    }
}

/// Static information about an instruction.
#[derive(Copy, Clone, Debug)]
pub struct InstructionInfo {
    pub name: &'static str,
    pub args: usize,
    pub ret: usize,
    pub tier: GasPriceTier,
}

impl InstructionInfo {
    const fn new(
        name: &'static str, args: usize, ret: usize, tier: GasPriceTier,
    ) -> Self {
        InstructionInfo {
            name,
            args,
            ret,
            tier,
        }
    }
}

/// Lookup the info of the given instruction. `None` for undefined opcodes.
pub fn get_info(instruction: Instruction) -> Option<InstructionInfo> {
    use self::GasPriceTier::*;

    let info = match instruction {
        STOP => InstructionInfo::new("STOP", 0, 0, Zero),
        ADD => InstructionInfo::new("ADD", 2, 1, VeryLow),
        MUL => InstructionInfo::new("MUL", 2, 1, Low),
        SUB => InstructionInfo::new("SUB", 2, 1, VeryLow),
        DIV => InstructionInfo::new("DIV", 2, 1, Low),
        SDIV => InstructionInfo::new("SDIV", 2, 1, Low),
        MOD => InstructionInfo::new("MOD", 2, 1, Low),
        SMOD => InstructionInfo::new("SMOD", 2, 1, Low),
        ADDMOD => InstructionInfo::new("ADDMOD", 3, 1, Mid),
        MULMOD => InstructionInfo::new("MULMOD", 3, 1, Mid),
        EXP => InstructionInfo::new("EXP", 2, 1, Special),
        SIGNEXTEND => InstructionInfo::new("SIGNEXTEND", 2, 1, Low),
        LT => InstructionInfo::new("LT", 2, 1, VeryLow),
        GT => InstructionInfo::new("GT", 2, 1, VeryLow),
        SLT => InstructionInfo::new("SLT", 2, 1, VeryLow),
        SGT => InstructionInfo::new("SGT", 2, 1, VeryLow),
        EQ => InstructionInfo::new("EQ", 2, 1, VeryLow),
        ISZERO => InstructionInfo::new("ISZERO", 1, 1, VeryLow),
        AND => InstructionInfo::new("AND", 2, 1, VeryLow),
        OR => InstructionInfo::new("OR", 2, 1, VeryLow),
        XOR => InstructionInfo::new("XOR", 2, 1, VeryLow),
        NOT => InstructionInfo::new("NOT", 1, 1, VeryLow),
        BYTE => InstructionInfo::new("BYTE", 2, 1, VeryLow),
        SHL => InstructionInfo::new("SHL", 2, 1, VeryLow),
        SHR => InstructionInfo::new("SHR", 2, 1, VeryLow),
        SAR => InstructionInfo::new("SAR", 2, 1, VeryLow),
        SHA3 => InstructionInfo::new("SHA3", 2, 1, Special),
        ADDRESS => InstructionInfo::new("ADDRESS", 0, 1, Base),
        BALANCE => InstructionInfo::new("BALANCE", 1, 1, Special),
        ORIGIN => InstructionInfo::new("ORIGIN", 0, 1, Base),
        CALLER => InstructionInfo::new("CALLER", 0, 1, Base),
        CALLVALUE => InstructionInfo::new("CALLVALUE", 0, 1, Base),
        CALLDATALOAD => InstructionInfo::new("CALLDATALOAD", 1, 1, VeryLow),
        CALLDATASIZE => InstructionInfo::new("CALLDATASIZE", 0, 1, Base),
        CALLDATACOPY => InstructionInfo::new("CALLDATACOPY", 3, 0, Special),
        CODESIZE => InstructionInfo::new("CODESIZE", 0, 1, Base),
        CODECOPY => InstructionInfo::new("CODECOPY", 3, 0, Special),
        EXTCODESIZE => InstructionInfo::new("EXTCODESIZE", 1, 1, Special),
        EXTCODECOPY => InstructionInfo::new("EXTCODECOPY", 4, 0, Special),
        RETURNDATASIZE => InstructionInfo::new("RETURNDATASIZE", 0, 1, Base),
        RETURNDATACOPY => {
            InstructionInfo::new("RETURNDATACOPY", 3, 0, Special)
        }
        EXTCODEHASH => InstructionInfo::new("EXTCODEHASH", 1, 1, Special),
        BLOCKHASH => InstructionInfo::new("BLOCKHASH", 1, 1, Special),
        TIMESTAMP => InstructionInfo::new("TIMESTAMP", 0, 1, Base),
        NUMBER => InstructionInfo::new("NUMBER", 0, 1, Base),
        CHAINID => InstructionInfo::new("CHAINID", 0, 1, Base),
        SELFBALANCE => InstructionInfo::new("SELFBALANCE", 0, 1, Low),
        POP => InstructionInfo::new("POP", 1, 0, Base),
        MLOAD => InstructionInfo::new("MLOAD", 1, 1, VeryLow),
        MSTORE => InstructionInfo::new("MSTORE", 2, 0, VeryLow),
        MSTORE8 => InstructionInfo::new("MSTORE8", 2, 0, VeryLow),
        SLOAD => InstructionInfo::new("SLOAD", 1, 1, Special),
        SSTORE => InstructionInfo::new("SSTORE", 2, 0, Special),
        JUMP => InstructionInfo::new("JUMP", 1, 0, Mid),
        JUMPI => InstructionInfo::new("JUMPI", 2, 0, High),
        PC => InstructionInfo::new("PC", 0, 1, Base),
        MSIZE => InstructionInfo::new("MSIZE", 0, 1, Base),
        GAS => InstructionInfo::new("GAS", 0, 1, Base),
        JUMPDEST => InstructionInfo::new("JUMPDEST", 0, 0, Special),
        PUSH1..=PUSH32 => InstructionInfo::new("PUSH", 0, 1, VeryLow),
        DUP1..=DUP16 => {
            let n = dup_position(instruction) + 1;
            InstructionInfo::new("DUP", n, n + 1, VeryLow)
        }
        SWAP1..=SWAP16 => {
            let n = swap_position(instruction) + 1;
            InstructionInfo::new("SWAP", n, n, VeryLow)
        }
        LOG0..=LOG4 => {
            let topics = (instruction - LOG0) as usize;
            InstructionInfo::new("LOG", topics + 2, 0, Special)
        }
        CREATE => InstructionInfo::new("CREATE", 3, 1, Special),
        CALL => InstructionInfo::new("CALL", 7, 1, Special),
        CALLCODE => InstructionInfo::new("CALLCODE", 7, 1, Special),
        RETURN => InstructionInfo::new("RETURN", 2, 0, Zero),
        DELEGATECALL => InstructionInfo::new("DELEGATECALL", 6, 1, Special),
        CREATE2 => InstructionInfo::new("CREATE2", 4, 1, Special),
        STATICCALL => InstructionInfo::new("STATICCALL", 6, 1, Special),
        REVERT => InstructionInfo::new("REVERT", 2, 0, Zero),
        SUICIDE => InstructionInfo::new("SUICIDE", 1, 0, Special),
        _ => return None,
    };
    Some(info)
}

/// Whether the instruction is a PUSH variant.
pub fn is_push(instruction: Instruction) -> bool {
    (PUSH1..=PUSH32).contains(&instruction)
}

/// Number of immediate bytes consumed by a PUSH.
pub fn push_bytes(instruction: Instruction) -> usize {
    debug_assert!(is_push(instruction));
    (instruction - PUSH1) as usize + 1
}

/// Stack position duplicated by a DUP, 0-based from the top.
pub fn dup_position(instruction: Instruction) -> usize {
    (instruction - DUP1) as usize
}

/// Stack position exchanged with the top by a SWAP, 0-based from the top.
pub fn swap_position(instruction: Instruction) -> usize {
    (instruction - SWAP1) as usize + 1
}

/// Number of topics of a LOG.
pub fn log_topics(instruction: Instruction) -> usize {
    (instruction - LOG0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_push_dup_swap_ranges() {
        for op in PUSH1..=PUSH32 {
            assert!(get_info(op).is_some());
            assert!(is_push(op));
        }
        assert_eq!(push_bytes(PUSH1), 1);
        assert_eq!(push_bytes(PUSH32), 32);
        assert_eq!(dup_position(DUP1), 0);
        assert_eq!(swap_position(SWAP16), 16);
        assert_eq!(log_topics(LOG4), 4);
    }

    #[test]
    fn undefined_opcodes_have_no_info() {
        assert!(get_info(0x0c).is_none());
        assert!(get_info(0x21).is_none());
        assert!(get_info(0xf6).is_none());
    }

    #[test]
    fn dup_needs_n_items() {
        assert_eq!(get_info(DUP16).unwrap().args, 16);
        assert_eq!(get_info(DUP16).unwrap().ret, 17);
        assert_eq!(get_info(SWAP3).unwrap().args, 4);
    }

    const SWAP3: Instruction = 0x92;
}
