// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Built-in contracts implemented in the host language: selector-dispatched
//! native functions and raw-input crypto precompiles.

pub mod abi;
pub mod permissions_contract;
pub mod precompiles;

pub use precompiles::{precompile_map, Precompile};

use self::abi::{AbiType, AbiValue};
use crate::{
    call::{use_gas, CallScope},
    permissions::{self, PermFlag},
};
use std::collections::BTreeMap;
use warren_types::{address_util::address_from_contract_name, Address, Bytes, Word256};
use warren_vm_types::{CallParams, Error, Result};

/// Flat charge per native function invocation.
pub const NATIVE_FUNCTION_GAS: u64 = 1;

pub type NativeExecFn =
    fn(&mut CallScope<'_, '_>, &CallParams, Vec<AbiValue>) -> Result<Word256>;

pub struct NativeFunction {
    pub signature: &'static str,
    pub selector: [u8; 4],
    /// Permission the caller must hold, after global fall-through.
    pub perm_flag: PermFlag,
    pub arg_types: Vec<AbiType>,
    exec: NativeExecFn,
}

impl NativeFunction {
    pub fn new(
        signature: &'static str, perm_flag: PermFlag,
        arg_types: Vec<AbiType>, exec: NativeExecFn,
    ) -> Self {
        NativeFunction {
            signature,
            selector: abi::selector(signature),
            perm_flag,
            arg_types,
            exec,
        }
    }

    /// The function name, without the argument list.
    pub fn name(&self) -> &'static str {
        self.signature
            .split('(')
            .next()
            .unwrap_or(self.signature)
    }
}

/// A built-in contract at a name-derived deterministic address, dispatching
/// on the 4-byte function selector.
pub struct NativeContract {
    pub name: &'static str,
    pub address: Address,
    functions: BTreeMap<[u8; 4], NativeFunction>,
}

impl NativeContract {
    pub fn new(name: &'static str, functions: Vec<NativeFunction>) -> Self {
        let address = address_from_contract_name(name);
        let functions = functions
            .into_iter()
            .map(|function| (function.selector, function))
            .collect();
        NativeContract {
            name,
            address,
            functions,
        }
    }

    pub fn function_by_selector(
        &self, selector: &[u8; 4],
    ) -> Option<&NativeFunction> {
        self.functions.get(selector)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.values().find(|f| f.name() == name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &NativeFunction> {
        self.functions.values()
    }

    pub fn execute(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> Result<Bytes> {
        use_gas(&mut params.gas, NATIVE_FUNCTION_GAS)?;

        if params.input.len() < 4 {
            return Err(Error::NativeFunction(format!(
                "{}: missing function selector",
                self.name
            )));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&params.input[..4]);
        let function = self.function_by_selector(&selector).ok_or_else(|| {
            Error::NativeFunction(format!(
                "{}: unknown function {}",
                self.name,
                hex::encode(selector)
            ))
        })?;

        // Permission failures surface as native-function errors, not
        // engine-level permission errors.
        if !permissions::has_permission(
            scope.frame,
            &params.caller,
            function.perm_flag,
        )? {
            return Err(Error::NativeFunction(format!(
                "account {:?} does not have permission to call {}",
                params.caller,
                function.name()
            )));
        }

        let args = abi::decode(&function.arg_types, &params.input[4..])?;
        debug!(
            "native {}.{} from {:?}",
            self.name,
            function.name(),
            params.caller
        );
        let word = (function.exec)(scope, params, args)?;
        Ok(word.as_bytes().to_vec())
    }
}
