// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

mod interpreter;

pub use interpreter::Interpreter;

use warren_vm_types::ReturnData;

/// Result a frame execution settles to.
#[derive(Debug)]
pub struct FinalizationResult {
    /// Final amount of gas left.
    pub gas_left: u64,
    /// Apply execution state changes or revert them.
    pub apply_state: bool,
    /// Return data buffer.
    pub return_data: ReturnData,
}
