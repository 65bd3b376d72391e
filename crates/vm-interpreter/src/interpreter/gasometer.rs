// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use warren_types::{BigEndianHash, Word256, U256};
use warren_vm_types::{self as vm, Context, Spec};

use super::{
    instructions::{self, Instruction, InstructionInfo},
    stack::Stack,
    u256_to_address,
};

macro_rules! overflowing {
    ($x:expr) => {{
        let (v, overflow) = $x;
        if overflow {
            return Err(vm::Error::InsufficientGas);
        }
        v
    }};
}

enum Request {
    Gas(u64),
    GasMem(u64, usize),
    GasMemProvide(u64, usize, Option<U256>),
    GasMemCopy(u64, usize, U256),
}

pub struct InstructionRequirements {
    pub gas_cost: u64,
    /// Gas handed to the child of a CALL/CREATE variant.
    pub provide_gas: Option<u64>,
    pub memory_total_gas: u64,
    pub memory_required_size: usize,
    pub gas_refund: u64,
}

pub struct Gasometer {
    pub current_gas: u64,
    pub current_mem_gas: u64,
    /// Refunds accrued by storage clears; capped at finalization.
    pub refunds: u64,
}

impl Gasometer {
    pub fn new(current_gas: u64) -> Self {
        Gasometer {
            current_gas,
            current_mem_gas: 0,
            refunds: 0,
        }
    }

    pub fn verify_gas(&self, gas_cost: u64) -> vm::Result<()> {
        if self.current_gas < gas_cost {
            Err(vm::Error::InsufficientGas)
        } else {
            Ok(())
        }
    }

    /// How much gas a CALL/CREATE hands to its child, given that `needed`
    /// is deducted for the operation itself and `requested` was asked for.
    /// EIP-150: at most remaining - remaining / 64 is forwarded.
    pub fn gas_provided(
        &self, spec: &Spec, needed: u64, requested: Option<U256>,
    ) -> vm::Result<u64> {
        let gas_remaining = self
            .current_gas
            .checked_sub(needed)
            .ok_or(vm::Error::InsufficientGas)?;
        let max_gas_provided = match spec.sub_gas_cap_divisor {
            64 => gas_remaining - (gas_remaining >> 6),
            cap_divisor => gas_remaining - gas_remaining / cap_divisor,
        };
        Ok(match requested {
            Some(requested) if requested <= U256::from(max_gas_provided) => {
                requested.low_u64()
            }
            _ => max_gas_provided,
        })
    }

    /// Determine how much gas the given instruction needs, given the
    /// machine's state. `provide_gas` is `Some` iff the instruction is one
    /// of CREATE or the CALL variants.
    pub fn requirements(
        &mut self, context: &mut dyn Context, instruction: Instruction,
        info: &InstructionInfo, stack: &dyn Stack<U256>,
        current_mem_size: usize,
    ) -> vm::Result<InstructionRequirements> {
        let spec = context.spec().clone();
        let tier = info.tier.idx();
        let default_gas = spec.tier_step_gas[tier];

        let mut gas_refund = 0;

        let cost = match instruction {
            instructions::JUMPDEST => Request::Gas(spec.jumpdest_gas),
            instructions::SSTORE => {
                let key = Word256::from_uint(stack.peek(0));
                let new_val = stack.peek(1);
                let current_val = context.storage_at(&key)?.into_uint();
                let gas = if current_val.is_zero() && !new_val.is_zero() {
                    spec.sstore_set_gas
                } else {
                    if !current_val.is_zero() && new_val.is_zero() {
                        gas_refund += spec.sstore_clears_refund;
                    }
                    spec.sstore_reset_gas
                };
                Request::Gas(gas)
            }
            instructions::SLOAD => Request::Gas(spec.sload_gas),
            instructions::BALANCE => Request::Gas(spec.balance_gas),
            instructions::EXTCODESIZE => Request::Gas(spec.extcodesize_gas),
            instructions::EXTCODEHASH => Request::Gas(spec.extcodehash_gas),
            instructions::BLOCKHASH => Request::Gas(spec.blockhash_gas),
            instructions::SUICIDE => {
                let mut gas = spec.suicide_gas;
                let refund_address = u256_to_address(stack.peek(0));
                if !context.exists(&refund_address)? {
                    gas = overflowing!(
                        gas.overflowing_add(spec.suicide_to_new_account_cost)
                    );
                }
                Request::Gas(gas)
            }
            instructions::MSTORE | instructions::MLOAD => Request::GasMem(
                default_gas,
                mem_needed_const(stack.peek(0), 32)?,
            ),
            instructions::MSTORE8 => Request::GasMem(
                default_gas,
                mem_needed_const(stack.peek(0), 1)?,
            ),
            instructions::RETURN | instructions::REVERT => Request::GasMem(
                default_gas,
                mem_needed(stack.peek(0), stack.peek(1))?,
            ),
            instructions::SHA3 => {
                let words = to_word_count(stack.peek(1))?;
                let gas = overflowing!(spec
                    .sha3_gas
                    .overflowing_add(overflowing!(
                        spec.sha3_word_gas.overflowing_mul(words)
                    )));
                Request::GasMem(gas, mem_needed(stack.peek(0), stack.peek(1))?)
            }
            instructions::CALLDATACOPY | instructions::CODECOPY
            | instructions::RETURNDATACOPY => Request::GasMemCopy(
                default_gas,
                mem_needed(stack.peek(0), stack.peek(2))?,
                *stack.peek(2),
            ),
            instructions::EXTCODECOPY => Request::GasMemCopy(
                spec.extcodecopy_base_gas,
                mem_needed(stack.peek(1), stack.peek(3))?,
                *stack.peek(3),
            ),
            instructions::LOG0..=instructions::LOG4 => {
                let topics = instructions::log_topics(instruction) as u64;
                let data_len = stack.peek(1);
                if *data_len > U256::from(u32::MAX) {
                    return Err(vm::Error::OutOfMemory);
                }
                let data_gas = overflowing!(
                    spec.log_data_gas.overflowing_mul(data_len.low_u64())
                );
                let gas = overflowing!(spec
                    .log_gas
                    .overflowing_add(overflowing!(
                        spec.log_topic_gas.overflowing_mul(topics)
                    )));
                let gas = overflowing!(gas.overflowing_add(data_gas));
                Request::GasMem(gas, mem_needed(stack.peek(0), stack.peek(1))?)
            }
            instructions::CALL | instructions::CALLCODE => {
                // The engine charges the fixed account-lookup cost from the
                // forwarded cell; cover it here so the split nets out.
                let mut gas = spec.call_gas + spec.get_account_gas;
                let mem = std::cmp::max(
                    mem_needed(stack.peek(5), stack.peek(6))?,
                    mem_needed(stack.peek(3), stack.peek(4))?,
                );
                let value = stack.peek(2);
                let is_value_transfer = !value.is_zero();
                if is_value_transfer {
                    gas = overflowing!(
                        gas.overflowing_add(spec.call_value_transfer_gas)
                    );
                    let address = u256_to_address(stack.peek(1));
                    if instruction == instructions::CALL
                        && !context.exists(&address)?
                    {
                        gas = overflowing!(
                            gas.overflowing_add(spec.call_new_account_gas)
                        );
                    }
                }
                Request::GasMemProvide(gas, mem, Some(*stack.peek(0)))
            }
            instructions::DELEGATECALL | instructions::STATICCALL => {
                let mem = std::cmp::max(
                    mem_needed(stack.peek(4), stack.peek(5))?,
                    mem_needed(stack.peek(2), stack.peek(3))?,
                );
                Request::GasMemProvide(
                    spec.call_gas + spec.get_account_gas,
                    mem,
                    Some(*stack.peek(0)),
                )
            }
            instructions::CREATE => Request::GasMemProvide(
                spec.create_gas,
                mem_needed(stack.peek(1), stack.peek(2))?,
                None,
            ),
            instructions::CREATE2 => {
                let words = to_word_count(stack.peek(2))?;
                let gas = overflowing!(spec
                    .create_gas
                    .overflowing_add(overflowing!(
                        spec.sha3_word_gas.overflowing_mul(words)
                    )));
                Request::GasMemProvide(
                    gas,
                    mem_needed(stack.peek(1), stack.peek(2))?,
                    None,
                )
            }
            instructions::EXP => {
                let expon = stack.peek(1);
                let bytes = ((expon.bits() + 7) / 8) as u64;
                let gas = overflowing!(spec
                    .exp_gas
                    .overflowing_add(overflowing!(
                        spec.exp_byte_gas.overflowing_mul(bytes)
                    )));
                Request::Gas(gas)
            }
            _ => Request::Gas(default_gas),
        };

        Ok(match cost {
            Request::Gas(gas) => InstructionRequirements {
                gas_cost: gas,
                provide_gas: None,
                memory_required_size: current_mem_size,
                memory_total_gas: self.current_mem_gas,
                gas_refund,
            },
            Request::GasMem(gas, mem_size) => {
                let (mem_gas_cost, new_mem_gas, new_mem_size) =
                    self.mem_gas_cost(&spec, current_mem_size, mem_size)?;
                let gas = overflowing!(gas.overflowing_add(mem_gas_cost));
                InstructionRequirements {
                    gas_cost: gas,
                    provide_gas: None,
                    memory_required_size: new_mem_size,
                    memory_total_gas: new_mem_gas,
                    gas_refund,
                }
            }
            Request::GasMemProvide(gas, mem_size, requested) => {
                let (mem_gas_cost, new_mem_gas, new_mem_size) =
                    self.mem_gas_cost(&spec, current_mem_size, mem_size)?;
                let gas = overflowing!(gas.overflowing_add(mem_gas_cost));
                let provided = self.gas_provided(&spec, gas, requested)?;
                let total = overflowing!(gas.overflowing_add(provided));
                InstructionRequirements {
                    gas_cost: total,
                    provide_gas: Some(provided),
                    memory_required_size: new_mem_size,
                    memory_total_gas: new_mem_gas,
                    gas_refund,
                }
            }
            Request::GasMemCopy(gas, mem_size, copy) => {
                let (mem_gas_cost, new_mem_gas, new_mem_size) =
                    self.mem_gas_cost(&spec, current_mem_size, mem_size)?;
                let copy_words = to_word_count(&copy)?;
                let copy_gas = overflowing!(
                    spec.copy_gas.overflowing_mul(copy_words)
                );
                let gas = overflowing!(gas.overflowing_add(copy_gas));
                let gas = overflowing!(gas.overflowing_add(mem_gas_cost));
                InstructionRequirements {
                    gas_cost: gas,
                    provide_gas: None,
                    memory_required_size: new_mem_size,
                    memory_total_gas: new_mem_gas,
                    gas_refund,
                }
            }
        })
    }

    /// Cost of expanding memory to `mem_size`: linear word cost plus the
    /// quadratic term. Returns (charge now, new total memory gas, new size).
    fn mem_gas_cost(
        &self, spec: &Spec, current_mem_size: usize, mem_size: usize,
    ) -> vm::Result<(u64, u64, usize)> {
        let gas_for_mem = |mem_size: u64| -> vm::Result<u64> {
            let s = mem_size / 32;
            let linear = overflowing!(s.overflowing_mul(spec.memory_gas));
            let quad = overflowing!(s.overflowing_mul(s)) / spec.quad_coeff_div;
            Ok(overflowing!(linear.overflowing_add(quad)))
        };

        let current_mem_size = current_mem_size as u64;
        let requested_mem_size = (mem_size as u64).div_ceil(32) * 32;

        if requested_mem_size <= current_mem_size {
            return Ok((0, self.current_mem_gas, mem_size));
        }

        let new_mem_gas = gas_for_mem(requested_mem_size)?;
        Ok((
            new_mem_gas - self.current_mem_gas,
            new_mem_gas,
            requested_mem_size as usize,
        ))
    }
}

/// Memory region end for a fixed-size access at `offset`.
fn mem_needed_const(offset: &U256, size: usize) -> vm::Result<usize> {
    mem_needed(offset, &U256::from(size))
}

/// Memory region end for an `[offset, offset + size)` access. Zero-size
/// accesses need no memory.
fn mem_needed(offset: &U256, size: &U256) -> vm::Result<usize> {
    if size.is_zero() {
        return Ok(0);
    }
    let end = offset
        .checked_add(*size)
        .ok_or(vm::Error::OutOfMemory)?;
    if end > U256::from(u32::MAX) {
        return Err(vm::Error::OutOfMemory);
    }
    Ok(end.low_u64() as usize)
}

fn to_word_count(size: &U256) -> vm::Result<u64> {
    if *size > U256::from(u32::MAX) {
        return Err(vm::Error::OutOfMemory);
    }
    Ok(size.low_u64().div_ceil(32))
}
