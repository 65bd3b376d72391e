// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Bytecode interpreter with a synchronous call graph: CALL-family and
//! CREATE instructions re-enter the engine through the frame context and
//! only return once the child frame has settled.

pub mod gasometer;
pub mod instructions;
pub mod memory;
pub mod stack;

use self::{
    gasometer::Gasometer,
    instructions::{Instruction, InstructionInfo},
    memory::Memory,
    stack::{Stack, VecStack},
};
use crate::FinalizationResult;
use keccak_hash::keccak;
use log::trace;
use std::collections::HashSet;
use warren_types::{
    Address, BigEndianHash, Bytes, CreateContractAddressType, Word256, H256,
    U256, U512,
};
use warren_vm_types::{
    self as vm, CallParams, CallType, Context, ContractCreateResult,
    MessageCallResult, ReturnData,
};

pub fn u256_to_address(value: &U256) -> Address {
    let addr: H256 = BigEndianHash::from_uint(value);
    Address::from(addr)
}

fn address_to_u256(value: Address) -> U256 {
    H256::from(value).into_uint()
}

/// Signed interpretation helpers. A word is negative iff bit 255 is set.
fn is_neg(value: &U256) -> bool { value.bit(255) }

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

struct CodeReader {
    code: Bytes,
    position: usize,
}

impl CodeReader {
    fn next(&mut self) -> Option<Instruction> {
        let instruction = self.code.get(self.position).copied();
        if instruction.is_some() {
            self.position += 1;
        }
        instruction
    }

    /// Read up to `bytes` immediate bytes as a big-endian word, zero-padded
    /// past the end of code.
    fn read_push(&mut self, bytes: usize) -> U256 {
        let max = std::cmp::min(self.position + bytes, self.code.len());
        let value = U256::from_big_endian(&self.code[self.position..max]);
        let value = value << (8 * (bytes - (max - self.position)));
        self.position += bytes;
        value
    }

    fn len(&self) -> usize { self.code.len() }
}

enum InstructionResult {
    Ok,
    JumpTo(usize),
    StopExecution,
    StopExecutionNeedsReturn {
        init_off: usize,
        init_size: usize,
        apply_state: bool,
    },
}

pub struct Interpreter {
    params: CallParams,
    reader: CodeReader,
    stack: VecStack<U256>,
    mem: Memory,
    gasometer: Gasometer,
    return_data: ReturnData,
    jump_destinations: Option<HashSet<usize>>,
    initial_gas: u64,
}

impl Interpreter {
    pub fn new(params: CallParams, code: Bytes) -> Self {
        let initial_gas = params.gas;
        Interpreter {
            params,
            reader: CodeReader { code, position: 0 },
            stack: VecStack::with_capacity(1024),
            mem: Memory::new(),
            gasometer: Gasometer::new(initial_gas),
            return_data: ReturnData::empty(),
            jump_destinations: None,
            initial_gas,
        }
    }

    /// Run the code to completion against `context`.
    pub fn exec(
        mut self, context: &mut dyn Context,
    ) -> vm::Result<FinalizationResult> {
        loop {
            let instruction = match self.reader.next() {
                Some(instruction) => instruction,
                // Running off the end of code is an implicit STOP.
                None => break,
            };
            let info = instructions::get_info(instruction)
                .ok_or(vm::Error::BadInstruction { instruction })?;
            self.verify_instruction(context, &info)?;

            let requirements = self.gasometer.requirements(
                context,
                instruction,
                &info,
                &self.stack,
                self.mem.size(),
            )?;
            self.gasometer.verify_gas(requirements.gas_cost)?;
            self.mem.expand(requirements.memory_required_size);
            self.gasometer.current_mem_gas = requirements.memory_total_gas;
            self.gasometer.current_gas -= requirements.gas_cost;
            self.gasometer.refunds += requirements.gas_refund;

            trace!(
                target: "interpreter",
                "[{}] {}({:#x}) gas_left={}",
                self.reader.position - 1,
                info.name,
                instruction,
                self.gasometer.current_gas,
            );

            match self.exec_instruction(
                context,
                instruction,
                &info,
                requirements.provide_gas,
            )? {
                InstructionResult::Ok => {}
                InstructionResult::JumpTo(position) => {
                    self.reader.position = position;
                }
                InstructionResult::StopExecution => break,
                InstructionResult::StopExecutionNeedsReturn {
                    init_off,
                    init_size,
                    apply_state,
                } => {
                    let gas_left =
                        self.finalize_gas(context, apply_state);
                    return Ok(FinalizationResult {
                        gas_left,
                        apply_state,
                        return_data: self
                            .mem
                            .into_return_data(init_off, init_size),
                    });
                }
            }
        }

        let gas_left = self.finalize_gas(context, true);
        Ok(FinalizationResult {
            gas_left,
            apply_state: true,
            return_data: ReturnData::empty(),
        })
    }

    /// Storage-clear refunds are granted only when the frame commits,
    /// capped at gas_used / max_refund_quotient.
    fn finalize_gas(&self, context: &dyn Context, apply_state: bool) -> u64 {
        let gas_left = self.gasometer.current_gas;
        if !apply_state {
            return gas_left;
        }
        let gas_used = self.initial_gas - gas_left;
        let refund = std::cmp::min(
            self.gasometer.refunds,
            gas_used / context.spec().max_refund_quotient,
        );
        gas_left + refund
    }

    fn verify_instruction(
        &self, context: &dyn Context, info: &InstructionInfo,
    ) -> vm::Result<()> {
        if !self.stack.has(info.args) {
            return Err(vm::Error::StackUnderflow {
                instruction: info.name,
                wanted: info.args,
                on_stack: self.stack.size(),
            });
        }
        if self.stack.size() - info.args + info.ret
            > context.spec().stack_limit
        {
            return Err(vm::Error::OutOfStack {
                instruction: info.name,
                wanted: info.ret.saturating_sub(info.args),
                limit: context.spec().stack_limit,
            });
        }
        Ok(())
    }

    fn verify_jump(&mut self, destination: U256) -> vm::Result<usize> {
        if self.jump_destinations.is_none() {
            self.jump_destinations =
                Some(find_jump_destinations(&self.reader.code));
        }
        let destinations = self.jump_destinations.as_ref().unwrap();
        let destination_usize = destination.low_u64() as usize;
        if destination <= U256::from(u32::MAX)
            && destinations.contains(&destination_usize)
        {
            Ok(destination_usize)
        } else {
            Err(vm::Error::BadJumpDestination {
                destination: destination.low_u64() as usize,
            })
        }
    }

    fn exec_instruction(
        &mut self, context: &mut dyn Context, instruction: Instruction,
        _info: &InstructionInfo, provided: Option<u64>,
    ) -> vm::Result<InstructionResult> {
        use self::instructions::*;

        match instruction {
            STOP => return Ok(InstructionResult::StopExecution),
            RETURN | REVERT => {
                let init_off = self.stack.pop_back().low_u64() as usize;
                let init_size = self.stack.pop_back().low_u64() as usize;
                return Ok(InstructionResult::StopExecutionNeedsReturn {
                    init_off,
                    init_size,
                    apply_state: instruction == RETURN,
                });
            }
            SUICIDE => {
                if context.is_static() {
                    return Err(vm::Error::MutableCallInStaticContext);
                }
                let refund_address = u256_to_address(&self.stack.pop_back());
                context.suicide(&refund_address)?;
                return Ok(InstructionResult::StopExecution);
            }

            ADD => self.binary_op(|a, b| a.overflowing_add(b).0),
            MUL => self.binary_op(|a, b| a.overflowing_mul(b).0),
            SUB => self.binary_op(|a, b| a.overflowing_sub(b).0),
            DIV => self.binary_op(|a, b| {
                // Division by zero yields zero, no trap.
                if b.is_zero() {
                    U256::zero()
                } else {
                    a / b
                }
            }),
            MOD => self.binary_op(|a, b| {
                if b.is_zero() {
                    U256::zero()
                } else {
                    a % b
                }
            }),
            SDIV => self.binary_op(signed_div),
            SMOD => self.binary_op(signed_mod),
            ADDMOD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                let m = self.stack.pop_back();
                let result = if m.is_zero() {
                    U256::zero()
                } else {
                    let v = (U512::from(a) + U512::from(b)) % U512::from(m);
                    U256::try_from(v).expect("modulo fits the base type")
                };
                self.stack.push(result);
            }
            MULMOD => {
                let a = self.stack.pop_back();
                let b = self.stack.pop_back();
                let m = self.stack.pop_back();
                let result = if m.is_zero() {
                    U256::zero()
                } else {
                    let v = (U512::from(a) * U512::from(b)) % U512::from(m);
                    U256::try_from(v).expect("modulo fits the base type")
                };
                self.stack.push(result);
            }
            EXP => self.binary_op(|a, b| a.overflowing_pow(b).0),
            SIGNEXTEND => {
                let ext = self.stack.pop_back();
                let value = self.stack.pop_back();
                let result = if ext < U256::from(31) {
                    let bit = ext.low_u64() as usize * 8 + 7;
                    let mask = (U256::one() << bit) - U256::one();
                    if value.bit(bit) {
                        value | !mask
                    } else {
                        value & mask
                    }
                } else {
                    value
                };
                self.stack.push(result);
            }

            LT => self.binary_op(|a, b| bool_to_u256(a < b)),
            GT => self.binary_op(|a, b| bool_to_u256(a > b)),
            SLT => self.binary_op(|a, b| {
                bool_to_u256(match (is_neg(&a), is_neg(&b)) {
                    (false, false) => a < b,
                    (true, true) => a > b,
                    (true, false) => true,
                    (false, true) => false,
                })
            }),
            SGT => self.binary_op(|a, b| {
                bool_to_u256(match (is_neg(&a), is_neg(&b)) {
                    (false, false) => a > b,
                    (true, true) => a < b,
                    (true, false) => false,
                    (false, true) => true,
                })
            }),
            EQ => self.binary_op(|a, b| bool_to_u256(a == b)),
            ISZERO => {
                let a = self.stack.pop_back();
                self.stack.push(bool_to_u256(a.is_zero()));
            }
            AND => self.binary_op(|a, b| a & b),
            OR => self.binary_op(|a, b| a | b),
            XOR => self.binary_op(|a, b| a ^ b),
            NOT => {
                let a = self.stack.pop_back();
                self.stack.push(!a);
            }
            BYTE => self.binary_op(|index, value| {
                if index < U256::from(32) {
                    let byte = value.byte(31 - index.low_u64() as usize);
                    U256::from(byte)
                } else {
                    U256::zero()
                }
            }),
            SHL => self.binary_op(|shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.low_u64() as usize
                }
            }),
            SHR => self.binary_op(|shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.low_u64() as usize
                }
            }),
            SAR => self.binary_op(|shift, value| {
                let neg = is_neg(&value);
                if shift >= U256::from(256) {
                    if neg {
                        !U256::zero()
                    } else {
                        U256::zero()
                    }
                } else {
                    let shift = shift.low_u64() as usize;
                    let shifted = value >> shift;
                    if neg {
                        shifted | (!U256::zero() << (256 - shift))
                    } else {
                        shifted
                    }
                }
            }),

            SHA3 => {
                let offset = self.stack.pop_back().low_u64() as usize;
                let size = self.stack.pop_back().low_u64() as usize;
                let hash = keccak(self.mem.read_slice(offset, size));
                self.stack.push(hash.into_uint());
            }

            ADDRESS => {
                self.stack.push(address_to_u256(self.params.callee));
            }
            ORIGIN => self.stack.push(address_to_u256(self.params.origin)),
            CALLER => self.stack.push(address_to_u256(self.params.caller)),
            CALLVALUE => self.stack.push(self.params.value),
            BALANCE => {
                let address = u256_to_address(&self.stack.pop_back());
                let balance = context.balance(&address)?;
                self.stack.push(balance);
            }
            SELFBALANCE => {
                let balance = context.balance(&self.params.callee)?;
                self.stack.push(balance);
            }
            CALLDATALOAD => {
                let offset = self.stack.pop_back();
                self.stack.push(data_word(&self.params.input, offset));
            }
            CALLDATASIZE => {
                self.stack.push(U256::from(self.params.input.len()));
            }
            CALLDATACOPY => {
                let input = std::mem::take(&mut self.params.input);
                self.copy_data_to_memory(&input);
                self.params.input = input;
            }
            CODESIZE => self.stack.push(U256::from(self.reader.len())),
            CODECOPY => {
                let code = std::mem::take(&mut self.reader.code);
                self.copy_data_to_memory(&code);
                self.reader.code = code;
            }
            EXTCODESIZE => {
                let address = u256_to_address(&self.stack.pop_back());
                let size = context.extcodesize(&address)?;
                self.stack.push(U256::from(size));
            }
            EXTCODEHASH => {
                let address = u256_to_address(&self.stack.pop_back());
                let hash = context.extcodehash(&address)?;
                self.stack.push(hash.into_uint());
            }
            EXTCODECOPY => {
                let address = u256_to_address(&self.stack.pop_back());
                let code = context.extcode(&address)?;
                self.copy_data_to_memory(&code);
            }
            RETURNDATASIZE => {
                self.stack.push(U256::from(self.return_data.len()));
            }
            RETURNDATACOPY => {
                let dest_offset = self.stack.pop_back().low_u64() as usize;
                let source_offset = self.stack.pop_back();
                let size = self.stack.pop_back().low_u64() as usize;
                let return_data_len = U256::from(self.return_data.len());
                if source_offset
                    .saturating_add(U256::from(size))
                    > return_data_len
                {
                    return Err(vm::Error::OutOfMemory);
                }
                let offset = source_offset.low_u64() as usize;
                let data = self.return_data[offset..offset + size].to_vec();
                self.mem.write_slice(dest_offset, &data);
            }

            BLOCKHASH => {
                // Only chain id, last height and last time are exposed to
                // execution; historical hashes read as zero.
                let _number = self.stack.pop_back();
                self.stack.push(U256::zero());
            }
            TIMESTAMP => {
                self.stack.push(U256::from(context.env().timestamp));
            }
            NUMBER => self.stack.push(U256::from(context.env().number)),
            CHAINID => self.stack.push(U256::from(context.env().chain_id)),

            POP => {
                self.stack.pop_back();
            }
            MLOAD => {
                let offset = self.stack.pop_back().low_u64() as usize;
                let word = self.mem.read(offset);
                self.stack.push(word);
            }
            MSTORE => {
                let offset = self.stack.pop_back().low_u64() as usize;
                let value = self.stack.pop_back();
                self.mem.write(offset, value);
            }
            MSTORE8 => {
                let offset = self.stack.pop_back().low_u64() as usize;
                let value = self.stack.pop_back();
                self.mem.write_byte(offset, value);
            }
            SLOAD => {
                let key = Word256::from_uint(&self.stack.pop_back());
                let value = context.storage_at(&key)?;
                self.stack.push(value.into_uint());
            }
            SSTORE => {
                if context.is_static() {
                    return Err(vm::Error::MutableCallInStaticContext);
                }
                let key = Word256::from_uint(&self.stack.pop_back());
                let value = Word256::from_uint(&self.stack.pop_back());
                context.set_storage(key, value)?;
            }
            JUMP => {
                let destination = self.stack.pop_back();
                let position = self.verify_jump(destination)?;
                return Ok(InstructionResult::JumpTo(position));
            }
            JUMPI => {
                let destination = self.stack.pop_back();
                let condition = self.stack.pop_back();
                if !condition.is_zero() {
                    let position = self.verify_jump(destination)?;
                    return Ok(InstructionResult::JumpTo(position));
                }
            }
            PC => self.stack.push(U256::from(self.reader.position - 1)),
            MSIZE => self.stack.push(U256::from(self.mem.size())),
            GAS => self.stack.push(U256::from(self.gasometer.current_gas)),
            JUMPDEST => {}

            PUSH1..=PUSH32 => {
                let bytes = push_bytes(instruction);
                let value = self.reader.read_push(bytes);
                self.stack.push(value);
            }
            DUP1..=DUP16 => {
                let position = dup_position(instruction);
                let value = *self.stack.peek(position);
                self.stack.push(value);
            }
            SWAP1..=SWAP16 => {
                let position = swap_position(instruction);
                self.stack.swap_with_top(position);
            }

            LOG0..=LOG4 => {
                if context.is_static() {
                    return Err(vm::Error::MutableCallInStaticContext);
                }
                let topic_count = log_topics(instruction);
                let offset = self.stack.pop_back().low_u64() as usize;
                let size = self.stack.pop_back().low_u64() as usize;
                let topics = (0..topic_count)
                    .map(|_| Word256::from_uint(&self.stack.pop_back()))
                    .collect();
                let data = self.mem.read_slice(offset, size).to_vec();
                context.log(topics, &data)?;
            }

            CREATE | CREATE2 => {
                let result =
                    self.do_create(context, instruction, provided)?;
                return Ok(result);
            }
            CALL | CALLCODE | DELEGATECALL | STATICCALL => {
                let result = self.do_call(
                    context,
                    instruction,
                    provided.expect("call variants always provide gas"),
                )?;
                return Ok(result);
            }

            _ => {
                return Err(vm::Error::BadInstruction { instruction });
            }
        }
        Ok(InstructionResult::Ok)
    }

    fn do_create(
        &mut self, context: &mut dyn Context, instruction: Instruction,
        provided: Option<u64>,
    ) -> vm::Result<InstructionResult> {
        if context.is_static() {
            return Err(vm::Error::MutableCallInStaticContext);
        }
        let endowment = self.stack.pop_back();
        let init_off = self.stack.pop_back().low_u64() as usize;
        let init_size = self.stack.pop_back().low_u64() as usize;
        let address_scheme = if instruction == instructions::CREATE {
            CreateContractAddressType::FromSenderNonce
        } else {
            let salt = Word256::from_uint(&self.stack.pop_back());
            CreateContractAddressType::FromSenderSaltAndCodeHash(salt)
        };
        let create_gas = provided.expect("create variants always provide gas");

        let init_code = self.mem.read_slice(init_off, init_size).to_vec();
        self.return_data = ReturnData::empty();

        match context.create(
            create_gas,
            &endowment,
            &init_code,
            address_scheme,
        )? {
            ContractCreateResult::Created { address, gas_left } => {
                self.stack.push(address_to_u256(address));
                self.gasometer.current_gas += gas_left;
            }
            ContractCreateResult::Reverted {
                gas_left,
                return_data,
            } => {
                self.stack.push(U256::zero());
                self.return_data = return_data;
                self.gasometer.current_gas += gas_left;
            }
            ContractCreateResult::Failed(_) => {
                self.stack.push(U256::zero());
            }
        }
        Ok(InstructionResult::Ok)
    }

    fn do_call(
        &mut self, context: &mut dyn Context, instruction: Instruction,
        provided: u64,
    ) -> vm::Result<InstructionResult> {
        use self::instructions::*;

        // Requested gas was consumed by the gasometer already.
        let _requested = self.stack.pop_back();
        let code_address = u256_to_address(&self.stack.pop_back());

        let value = match instruction {
            CALL | CALLCODE => Some(self.stack.pop_back()),
            _ => None,
        };

        let in_off = self.stack.pop_back().low_u64() as usize;
        let in_size = self.stack.pop_back().low_u64() as usize;
        let out_off = self.stack.pop_back().low_u64() as usize;
        let out_size = self.stack.pop_back().low_u64() as usize;

        if instruction == CALL
            && context.is_static()
            && value.map_or(false, |v| !v.is_zero())
        {
            return Err(vm::Error::MutableCallInStaticContext);
        }

        let call_type = match instruction {
            CALL => CallType::Call,
            CALLCODE => CallType::CallCode,
            DELEGATECALL => CallType::DelegateCall,
            STATICCALL => CallType::StaticCall,
            _ => unreachable!("checked by the caller"),
        };

        // A non-zero value transfer hands the callee the stipend on top of
        // the forwarded gas.
        let call_gas = provided
            + value.map_or(0, |v| {
                if v.is_zero() {
                    0
                } else {
                    context.spec().call_stipend
                }
            });

        let input = self.mem.read_slice(in_off, in_size).to_vec();
        self.return_data = ReturnData::empty();

        let result = context.call(
            call_gas,
            &self.params.callee,
            &code_address,
            value,
            &input,
            &code_address,
            call_type,
        )?;

        match result {
            MessageCallResult::Success {
                gas_left,
                return_data,
            } => {
                let copied = std::cmp::min(out_size, return_data.len());
                self.mem.write_slice(out_off, &return_data[..copied]);
                self.stack.push(U256::one());
                self.return_data = return_data;
                self.gasometer.current_gas += gas_left;
            }
            MessageCallResult::Reverted {
                gas_left,
                return_data,
            } => {
                let copied = std::cmp::min(out_size, return_data.len());
                self.mem.write_slice(out_off, &return_data[..copied]);
                self.stack.push(U256::zero());
                self.return_data = return_data;
                self.gasometer.current_gas += gas_left;
            }
            MessageCallResult::Failed(_) => {
                self.stack.push(U256::zero());
            }
        }
        Ok(InstructionResult::Ok)
    }

    fn binary_op<F: FnOnce(U256, U256) -> U256>(&mut self, op: F) {
        let a = self.stack.pop_back();
        let b = self.stack.pop_back();
        self.stack.push(op(a, b));
    }

    /// Shared CALLDATACOPY/CODECOPY/EXTCODECOPY tail: dest, offset, size on
    /// the stack, zero-filled past the end of `source`.
    fn copy_data_to_memory(&mut self, source: &[u8]) {
        let dest_offset = self.stack.pop_back().low_u64() as usize;
        let source_offset = self.stack.pop_back();
        let size = self.stack.pop_back().low_u64() as usize;

        let source_len = U256::from(source.len());
        let (begin, copy_size) = if source_offset >= source_len {
            (0, 0)
        } else {
            let begin = source_offset.low_u64() as usize;
            (begin, std::cmp::min(size, source.len() - begin))
        };

        if copy_size > 0 {
            let data = source[begin..begin + copy_size].to_vec();
            self.mem.write_slice(dest_offset, &data);
        }
        // Zero-fill the remainder of the destination region.
        for i in copy_size..size {
            self.mem.write_byte(dest_offset + i, U256::zero());
        }
    }
}

/// The 32-byte word of `data` at `offset`, zero-padded past the end.
fn data_word(data: &[u8], offset: U256) -> U256 {
    if offset > U256::from(u32::MAX) {
        return U256::zero();
    }
    let offset = offset.low_u64() as usize;
    let mut word = [0u8; 32];
    if offset < data.len() {
        let end = std::cmp::min(offset + 32, data.len());
        word[..end - offset].copy_from_slice(&data[offset..end]);
    }
    U256::from_big_endian(&word)
}

fn bool_to_u256(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let (a_neg, a_abs) = unsign(a);
    let (b_neg, b_abs) = unsign(b);
    let quotient = a_abs / b_abs;
    if a_neg ^ b_neg {
        twos_complement(quotient)
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let (a_neg, a_abs) = unsign(a);
    let (_, b_abs) = unsign(b);
    let remainder = a_abs % b_abs;
    // Sign follows the dividend.
    if a_neg {
        twos_complement(remainder)
    } else {
        remainder
    }
}

fn unsign(value: U256) -> (bool, U256) {
    if is_neg(&value) {
        (true, twos_complement(value))
    } else {
        (false, value)
    }
}

/// Positions of JUMPDEST instructions, skipping push immediates.
fn find_jump_destinations(code: &[u8]) -> HashSet<usize> {
    let mut destinations = HashSet::new();
    let mut position = 0;
    while position < code.len() {
        let instruction = code[position];
        if instruction == instructions::JUMPDEST {
            destinations.insert(position);
        } else if instructions::is_push(instruction) {
            position += instructions::push_bytes(instruction);
        }
        position += 1;
    }
    destinations
}
