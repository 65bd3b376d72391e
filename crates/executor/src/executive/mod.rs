// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The consensus-facing entry point: one ordered transaction in, one output
//! and error out, with every state effect committed or discarded atomically.

#[cfg(test)]
mod tests;

use crate::{
    call::{use_gas, CallScope},
    dispatch::EvmExec,
    events::EventSink,
    machine::Machine,
    permissions,
    state::{Account, Backend, CallFrame, RootLayer, StateLayer},
    Callable,
};
use warren_types::{
    cal_contract_address, Bytes, CreateContractAddressType, U256,
};
use warren_vm_types::{CallParams, CallType, Env, Error, Maybe, Spec};

/// Base cost of a transaction: the flat call or create charge plus the
/// per-byte input cost.
pub fn gas_required_for(is_create: bool, data: &[u8], spec: &Spec) -> u64 {
    let init_gas = if is_create {
        spec.tx_create_gas
    } else {
        spec.tx_gas
    };
    let byte_gas = |b: &u8| match *b {
        0 => spec.tx_data_zero_gas,
        _ => spec.tx_data_non_zero_gas,
    };
    init_gas + data.iter().map(byte_gas).sum::<u64>()
}

/// Transaction executor. Holds the write lease on the base store for the
/// duration of each transaction.
pub struct Executive<'a> {
    store: &'a mut dyn Backend,
    env: &'a Env,
    machine: &'a Machine,
}

impl<'a> Executive<'a> {
    pub fn new(
        store: &'a mut dyn Backend, env: &'a Env, machine: &'a Machine,
    ) -> Self {
        Executive {
            store,
            env,
            machine,
        }
    }

    /// Execute a transaction against the resolved callee: native, WASM,
    /// EVM, or a plain value transfer, per the dispatch order.
    pub fn transact(
        &mut self, sink: &mut dyn EventSink, params: CallParams,
    ) -> (Bytes, Option<Error>) {
        if params.call_type.is_create() {
            self.run_transaction(sink, params, |scope, params| {
                transact_create(scope, params)
            })
        } else {
            self.run_transaction(sink, params, |scope, params| {
                transact_call(scope, params)
            })
        }
    }

    /// Execute the given EVM bytecode as the callee's code. The
    /// consensus-layer interface for running code that is not installed in
    /// an account.
    pub fn execute(
        &mut self, sink: &mut dyn EventSink, params: CallParams, code: &[u8],
    ) -> (Bytes, Option<Error>) {
        let evm = EvmExec {
            code: code.to_vec(),
        };
        self.run_transaction(sink, params, |scope, params| {
            evm.call(scope, params)
        })
    }

    /// Charge intrinsic gas, open the root frame, run, and settle: sync and
    /// flush events on success, discard on failure.
    fn run_transaction<F>(
        &mut self, sink: &mut dyn EventSink, mut params: CallParams, run: F,
    ) -> (Bytes, Option<Error>)
    where
        F: FnOnce(
            &mut CallScope<'_, '_>,
            &mut CallParams,
        ) -> (Bytes, Option<Error>),
    {
        let spec = self.machine.spec();
        let intrinsic_gas =
            gas_required_for(params.call_type.is_create(), &params.input, spec);
        if use_gas(&mut params.gas, intrinsic_gas).is_err() {
            return (Bytes::new(), Some(Error::InsufficientGas));
        }

        let mut root = RootLayer::new(self.store);
        let mut frame = CallFrame::new(&mut root, spec.max_call_depth);

        let (output, error) = {
            let mut scope = CallScope {
                frame: &mut frame,
                sink: &mut *sink,
                env: self.env,
                machine: self.machine,
            };
            run(&mut scope, &mut params)
        };

        if error.is_some() {
            trace!("transaction failed, frame discarded: {:?}", error);
            return (output, error);
        }

        if let Err(sync_error) = frame.sync() {
            return (
                output,
                Some(Error::Internal(format!(
                    "root frame sync failed: {}",
                    sync_error
                ))),
            );
        }
        if let Err(flush_error) = root.flush_logs(sink) {
            return (output, Some(flush_error));
        }
        (output, None)
    }
}

fn transact_call(
    scope: &mut CallScope<'_, '_>, params: &mut CallParams,
) -> (Bytes, Option<Error>) {
    let mut maybe = Maybe::new();
    if maybe.push_result(permissions::ensure_permission(
        scope.frame,
        &params.caller,
        permissions::CALL,
    )) {
        return (Bytes::new(), maybe.take());
    }
    if maybe.push_result(use_gas(
        &mut params.gas,
        scope.machine.spec().get_account_gas,
    )) {
        return (Bytes::new(), maybe.take());
    }

    let account = match scope.frame.get_account(&params.callee) {
        Ok(Some(account)) => account,
        Ok(None) => {
            // First transfer to a fresh address creates the account, on the
            // sender's creation permissions.
            if maybe.push_result(
                scope
                    .frame
                    .create_account(&params.caller, &params.callee),
            ) {
                return (Bytes::new(), maybe.take());
            }
            Account::new(params.callee)
        }
        Err(error) => {
            maybe.push(error);
            return (Bytes::new(), maybe.take());
        }
    };

    let callable = scope.machine.dispatch(&account);
    callable.call(scope, params)
}

fn transact_create(
    scope: &mut CallScope<'_, '_>, params: &mut CallParams,
) -> (Bytes, Option<Error>) {
    let mut maybe = Maybe::new();
    if maybe.push_result(permissions::ensure_permission(
        scope.frame,
        &params.caller,
        permissions::CREATE_CONTRACT,
    )) {
        return (Bytes::new(), maybe.take());
    }

    let nonce = match scope.frame.get_account(&params.caller) {
        Ok(account) => account.map_or(0, |account| account.sequence),
        Err(error) => {
            maybe.push(error);
            return (Bytes::new(), maybe.take());
        }
    };
    let code = std::mem::take(&mut params.input);
    let (address, _code_hash) = cal_contract_address(
        CreateContractAddressType::FromSenderNonce,
        &params.caller,
        &U256::from(nonce),
        &code,
    );
    if maybe.push_result(
        scope
            .frame
            .update_account_with(&params.caller, |account| {
                account.sequence += 1
            })
            .map(|_| ()),
    ) {
        return (Bytes::new(), maybe.take());
    }
    match scope.frame.get_account(&address) {
        Ok(Some(existing)) if existing.is_contract() => {
            maybe.push(Error::InvalidAddress(address));
            return (Bytes::new(), maybe.take());
        }
        Err(error) => {
            maybe.push(error);
            return (Bytes::new(), maybe.take());
        }
        _ => {}
    }

    let mut target = CallParams {
        call_type: CallType::Create,
        origin: params.origin,
        caller: params.caller,
        callee: address,
        input: Bytes::new(),
        value: params.value,
        gas: params.gas,
    };
    let (output, error) =
        crate::call::create_from_site(scope, &mut target, &code);
    params.gas = target.gas;
    params.callee = address;
    if let Some(error) = error {
        maybe.push(error);
    }
    (output, maybe.take())
}
