// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{CallType, Env, Error, Result, ReturnData, Spec};
use warren_types::{
    Address, Bytes, CreateContractAddressType, Word256, U256,
};

/// Result of a nested message call requested by an executor.
#[derive(Debug)]
pub enum MessageCallResult {
    /// Returned by the child frame on success. The child frame was synced.
    Success { gas_left: u64, return_data: ReturnData },
    /// The child reverted with output. Its frame was discarded.
    Reverted { gas_left: u64, return_data: ReturnData },
    /// The child failed outright; all its gas is consumed.
    Failed(Error),
}

/// Result of a nested contract creation requested by an executor.
#[derive(Debug)]
pub enum ContractCreateResult {
    /// The contract was created and its code installed.
    Created { address: Address, gas_left: u64 },
    /// The init code reverted with output. The frame was discarded.
    Reverted { gas_left: u64, return_data: ReturnData },
    /// The creation failed outright; all its gas is consumed.
    Failed(Error),
}

/// The world as seen by a running executor.
///
/// Every state access, event emission and nested call of the EVM interpreter
/// goes through this trait; the executor supplies an implementation bound to
/// the current frame. Nested calls run synchronously and return only after
/// the child frame has been synced or discarded.
pub trait Context {
    fn spec(&self) -> &Spec;

    fn env(&self) -> &Env;

    /// Depth of the current frame, 1-based for the transaction's root call.
    fn depth(&self) -> u64;

    /// Whether the current frame forbids state mutation and log emission.
    fn is_static(&self) -> bool;

    fn balance(&mut self, address: &Address) -> Result<U256>;

    fn exists(&mut self, address: &Address) -> Result<bool>;

    /// Storage read on the frame's storage context.
    fn storage_at(&mut self, key: &Word256) -> Result<Word256>;

    /// Storage write on the frame's storage context. Writing the zero word
    /// deletes the entry.
    fn set_storage(&mut self, key: Word256, value: Word256) -> Result<()>;

    fn extcode(&mut self, address: &Address) -> Result<Bytes>;

    fn extcodesize(&mut self, address: &Address) -> Result<usize>;

    fn extcodehash(&mut self, address: &Address) -> Result<Word256>;

    fn log(&mut self, topics: Vec<Word256>, data: &[u8]) -> Result<()>;

    /// Message-call into another account, entering a child frame.
    fn call(
        &mut self, gas: u64, sender: &Address, receiver: &Address,
        value: Option<U256>, data: &[u8], code_address: &Address,
        call_type: CallType,
    ) -> Result<MessageCallResult>;

    /// Create a new contract account and run its init code in a child frame.
    fn create(
        &mut self, gas: u64, value: &U256, code: &[u8],
        address_scheme: CreateContractAddressType,
    ) -> Result<ContractCreateResult>;

    /// Destroy the executing contract, moving its balance to
    /// `refund_address`.
    fn suicide(&mut self, refund_address: &Address) -> Result<()>;
}
