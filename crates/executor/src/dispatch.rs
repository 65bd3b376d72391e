// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Mapping accounts to the executor that runs them.

use crate::{
    call::{self, CallScope},
    context::FrameContext,
    natives::{NativeContract, Precompile},
    state::Account,
    wasm::WasmVm,
};
use std::{collections::BTreeMap, sync::Arc};
use warren_types::{Address, Bytes};
use warren_vm_interpreter::Interpreter;
use warren_vm_types::{CallParams, Error};

/// Anything the dispatcher can hand a frame to.
pub trait Callable {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>);
}

/// Maps an account to a callable, if this dispatcher recognises it.
pub trait Dispatcher {
    fn dispatch(&self, account: &Account) -> Option<Box<dyn Callable + '_>>;
}

/// An ordered dispatcher list; the first hit wins.
#[derive(Default)]
pub struct Externals {
    dispatchers: Vec<Box<dyn Dispatcher + Send + Sync>>,
}

impl Externals {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, dispatcher: Box<dyn Dispatcher + Send + Sync>) {
        self.dispatchers.push(dispatcher);
    }
}

impl Dispatcher for Externals {
    fn dispatch(&self, account: &Account) -> Option<Box<dyn Callable + '_>> {
        self.dispatchers
            .iter()
            .find_map(|dispatcher| dispatcher.dispatch(account))
    }
}

/// Resolves registered native contracts and precompiles by address.
pub struct NativesDispatcher {
    pub contracts: Arc<BTreeMap<Address, NativeContract>>,
    pub precompiles: Arc<BTreeMap<Address, Precompile>>,
}

impl Dispatcher for NativesDispatcher {
    fn dispatch(&self, account: &Account) -> Option<Box<dyn Callable + '_>> {
        if let Some(contract) = self.contracts.get(&account.address) {
            trace!("CallNative: {}", contract.name);
            return Some(Box::new(NativeExec { contract }));
        }
        if let Some(precompile) = self.precompiles.get(&account.address) {
            trace!("CallPrecompile: {}", precompile.name);
            return Some(Box::new(PrecompileExec { precompile }));
        }
        None
    }
}

/// Resolves contract accounts by their stored code kind: WASM before EVM.
pub struct CodeDispatcher {
    pub wasm_vm: Arc<WasmVm>,
}

impl Dispatcher for CodeDispatcher {
    fn dispatch(&self, account: &Account) -> Option<Box<dyn Callable + '_>> {
        if !account.wasm_code.is_empty() {
            trace!("CallWasm: {:?}", account.address);
            return Some(Box::new(WasmExec {
                vm: self.wasm_vm.clone(),
                code: account.wasm_code.clone(),
            }));
        }
        if !account.code.is_empty() {
            trace!("CallEvm: {:?}", account.address);
            return Some(Box::new(EvmExec {
                code: account.code.clone(),
            }));
        }
        None
    }
}

struct NativeExec<'m> {
    contract: &'m NativeContract,
}

impl Callable for NativeExec<'_> {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>) {
        call::call(scope, params, |scope, params| {
            match self.contract.execute(scope, params) {
                Ok(output) => (output, None),
                Err(error) => (Bytes::new(), Some(error)),
            }
        })
    }
}

struct PrecompileExec<'m> {
    precompile: &'m Precompile,
}

impl Callable for PrecompileExec<'_> {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>) {
        call::call(scope, params, |_, params| {
            match self.precompile.execute(params) {
                Ok(output) => (output, None),
                Err(error) => (Bytes::new(), Some(error)),
            }
        })
    }
}

/// Runs EVM bytecode through the interpreter against the current frame.
pub struct EvmExec {
    pub code: Bytes,
}

impl Callable for EvmExec {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>) {
        call::call(scope, params, |scope, params| {
            exec_evm_code(scope, params, &self.code)
        })
    }
}

pub(crate) fn exec_evm_code(
    scope: &mut CallScope<'_, '_>, params: &mut CallParams, code: &[u8],
) -> (Bytes, Option<Error>) {
    let interpreter = Interpreter::new(params.clone(), code.to_vec());
    let mut context = FrameContext::new(scope, params.clone());
    match interpreter.exec(&mut context) {
        Ok(result) => {
            params.gas = result.gas_left;
            let output = result.return_data.to_vec();
            if result.apply_state {
                (output, None)
            } else {
                (output, Some(Error::ExecutionReverted))
            }
        }
        Err(error) => {
            // Fatal instruction errors consume the frame's whole budget.
            params.gas = 0;
            (Bytes::new(), Some(error))
        }
    }
}

/// Runs WASM code through the sandboxed VM.
pub struct WasmExec {
    pub vm: Arc<WasmVm>,
    pub code: Bytes,
}

impl Callable for WasmExec {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>) {
        call::call(scope, params, |scope, params| {
            self.vm.execute(scope, params, &self.code)
        })
    }
}

/// Pure value transfer; returns empty output and leaves the gas cell alone.
pub struct NoopExec;

impl Callable for NoopExec {
    fn call(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
    ) -> (Bytes, Option<Error>) {
        call::call(scope, params, |_, _| (Bytes::new(), None))
    }
}

/// The executable of a contract-creation frame: create the account, move
/// the endowment, run the init code and install whatever it returns.
pub(crate) fn exec_create(
    scope: &mut CallScope<'_, '_>, params: &mut CallParams, code: &[u8],
) -> (Bytes, Option<Error>) {
    call::call(scope, params, |scope, params| {
        if let Err(error) =
            scope.frame.update_account(Account::new(params.callee))
        {
            return (Bytes::new(), Some(error));
        }
        if let Err(error) = call::transfer(
            scope.frame,
            &params.caller,
            &params.callee,
            &params.value,
        ) {
            return (Bytes::new(), Some(error));
        }

        let (output, error) = exec_evm_code(scope, params, code);
        if error.is_some() {
            return (output, error);
        }

        // The init code's return value becomes the contract's code.
        let installed = output.clone();
        match scope
            .frame
            .update_account_with(&params.callee, |account| {
                account.code = installed.clone()
            }) {
            Ok(_) => (output, None),
            Err(error) => (output, Some(error)),
        }
    })
}
