// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::call_type::CallType;
use warren_types::{Address, Bytes, U256};

/// Input parameters of a single frame.
///
/// `gas` is the frame's mutable gas cell: params travel down the call stack
/// by `&mut`, executors debit the field as they run, and whatever is left
/// when the frame returns is refunded to the caller.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub call_type: CallType,
    /// Externally-owned account that signed the top-level transaction.
    pub origin: Address,
    pub caller: Address,
    pub callee: Address,
    pub input: Bytes,
    pub value: U256,
    pub gas: u64,
}

impl Default for CallParams {
    fn default() -> Self {
        CallParams {
            call_type: CallType::Call,
            origin: Address::zero(),
            caller: Address::zero(),
            callee: Address::zero(),
            input: Bytes::new(),
            value: U256::zero(),
            gas: 0,
        }
    }
}
