// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The generic call protocol: the single wrapper every executor runs under,
//! and the recursive entry used when one contract calls another.

use crate::{
    events::CallEvent,
    machine::Machine,
    permissions,
    state::{Account, CallFrame, StateLayer},
    EventSink,
};
use warren_types::{Address, Bytes, U256};
use warren_vm_types::{CallParams, CallType, Env, Error, Maybe, Result};

/// Everything a frame's execution reaches for: the frame itself, the
/// transaction event sink, chain info and the machine's dispatch tables.
pub struct CallScope<'a, 'f> {
    pub frame: &'a mut CallFrame<'f>,
    pub sink: &'a mut dyn EventSink,
    pub env: &'a Env,
    pub machine: &'a Machine,
}

/// Debit `amount` from the gas cell.
pub fn use_gas(gas: &mut u64, amount: u64) -> Result<()> {
    if *gas < amount {
        *gas = 0;
        return Err(Error::InsufficientGas);
    }
    *gas -= amount;
    Ok(())
}

/// Move `value` from `from` to `to`. The sender needs the `Send` permission
/// and a sufficient balance; both accounts must exist.
pub fn transfer(
    frame: &mut CallFrame, from: &Address, to: &Address, value: &U256,
) -> Result<()> {
    if value.is_zero() {
        return Ok(());
    }
    permissions::ensure_permission(frame, from, permissions::SEND)?;
    if value.bits() > 64 {
        return Err(Error::InsufficientBalance { address: *from });
    }
    let amount = value.low_u64();
    let from_account = frame
        .get_account(from)?
        .ok_or(Error::UnknownAddress(*from))?;
    if from_account.balance < amount {
        return Err(Error::InsufficientBalance { address: *from });
    }
    frame
        .get_account(to)?
        .ok_or(Error::UnknownAddress(*to))?;
    frame.update_account_with(from, |account| account.balance -= amount)?;
    frame.update_account_with(to, |account| {
        account.balance = account.balance.saturating_add(amount)
    })?;
    Ok(())
}

/// Emit the post-call event, including the exception if one occurred.
pub fn fire_call_event(
    sink: &mut dyn EventSink, exception: Option<Error>, output: &[u8],
    params: &CallParams, stack_depth: u64,
) -> Result<()> {
    sink.call(CallEvent {
        call_type: params.call_type,
        origin: params.origin,
        caller: params.caller,
        callee: params.callee,
        input: params.input.clone(),
        value: params.value,
        gas: params.gas,
        stack_depth,
        return_data: output.to_vec(),
        exception,
    })
}

/// Standard wrapper implementing a callable's `call` with value transfer,
/// event firing and first-error accounting around `execute`.
pub fn call<F>(
    scope: &mut CallScope<'_, '_>, params: &mut CallParams, execute: F,
) -> (Bytes, Option<Error>)
where
    F: FnOnce(&mut CallScope<'_, '_>, &mut CallParams) -> (Bytes, Option<Error>),
{
    let mut maybe = Maybe::new();
    if params.call_type.transfers_value() {
        // A failed transfer is recorded but does not suppress execution, so
        // the post-call event still fires.
        maybe.push_result(transfer(
            scope.frame,
            &params.caller,
            &params.callee,
            &params.value,
        ));
    }

    let (output, exec_error) = execute(scope, params);
    if let Some(error) = exec_error {
        maybe.push(error);
    }

    let depth = scope.frame.depth();
    maybe.push_result(fire_call_event(
        scope.sink,
        maybe.error().cloned(),
        &output,
        params,
        depth,
    ));
    (output, maybe.take())
}

/// Recursive invocation of one contract by another: permission check, fixed
/// account-lookup gas, implicit account creation, a child frame with the
/// EIP-150 gas split, the caller/callee rewrite for the call type, dispatch,
/// and the sync-or-discard decision.
pub fn call_from_site(
    scope: &mut CallScope<'_, '_>, site: &mut CallParams,
    mut target: CallParams,
) -> (Bytes, Option<Error>) {
    let mut maybe = Maybe::new();

    if maybe.push_result(permissions::ensure_permission(
        scope.frame,
        &site.callee,
        permissions::CALL,
    )) {
        return (Bytes::new(), maybe.take());
    }

    if maybe.push_result(use_gas(
        &mut site.gas,
        scope.machine.spec().get_account_gas,
    )) {
        return (Bytes::new(), maybe.take());
    }

    // The pre-rewrite callee carries the code to run, also under CallCode
    // and DelegateCall where storage stays on the calling contract.
    let account = match resolve_target_account(scope, site, &target) {
        Ok(account) => account,
        Err(error) => {
            maybe.push(error);
            return (Bytes::new(), maybe.take());
        }
    };

    let mut child = match scope.frame.new_frame() {
        Ok(child) => child,
        Err(error) => {
            maybe.push(error);
            return (Bytes::new(), maybe.take());
        }
    };

    // EIP-150, the 63/64 rule: a caller short of the requested gas forwards
    // this fraction of what it has rather than failing.
    if site.gas < target.gas {
        target.gas = site.gas - site.gas / 64;
    }
    site.gas -= target.gas;

    target.origin = site.origin;
    match target.call_type {
        CallType::Call => {
            target.caller = site.callee;
        }
        CallType::StaticCall => {
            target.caller = site.callee;
            child.set_read_only();
        }
        CallType::CallCode => {
            target.caller = site.callee;
            target.callee = site.callee;
        }
        CallType::DelegateCall => {
            target.caller = site.caller;
            target.callee = site.callee;
        }
        CallType::Create | CallType::Create2 => {
            return (
                Bytes::new(),
                Some(Error::Internal(
                    "contract creation does not route through call sites"
                        .to_string(),
                )),
            );
        }
    }

    let callable = scope.machine.dispatch(&account);
    let (output, call_error) = {
        let mut child_scope = CallScope {
            frame: &mut child,
            sink: &mut *scope.sink,
            env: scope.env,
            machine: scope.machine,
        };
        callable.call(&mut child_scope, &mut target)
    };

    if call_error.is_none() {
        // A sync failure is an invariant violation and aborts the whole
        // transaction.
        if let Err(error) = child.sync() {
            maybe.push(Error::Internal(format!("frame sync failed: {}", error)));
        }
    } else {
        drop(child);
    }

    // Refund whatever the child left unconsumed.
    site.gas += target.gas;

    if let Some(error) = call_error {
        maybe.push(error);
    }
    (output, maybe.take())
}

fn resolve_target_account(
    scope: &mut CallScope<'_, '_>, site: &CallParams, target: &CallParams,
) -> Result<Account> {
    if let Some(account) = scope.frame.get_account(&target.callee)? {
        return Ok(account);
    }
    if target.call_type != CallType::Call {
        return Err(Error::UnknownAddress(target.callee));
    }
    // Funds sent to a fresh address in a plain call create the account on
    // the fly; the site needs the creation permissions.
    scope
        .frame
        .create_account(&site.callee, &target.callee)?;
    scope
        .frame
        .get_account(&target.callee)?
        .ok_or(Error::UnknownAddress(target.callee))
}

/// Open a child frame, create the contract account, move the endowment and
/// run the init code; install the returned code on success.
pub fn create_from_site(
    scope: &mut CallScope<'_, '_>, target: &mut CallParams, code: &[u8],
) -> (Bytes, Option<Error>) {
    let mut child = match scope.frame.new_frame() {
        Ok(child) => child,
        Err(error) => return (Bytes::new(), Some(error)),
    };

    let (output, create_error) = {
        let mut child_scope = CallScope {
            frame: &mut child,
            sink: &mut *scope.sink,
            env: scope.env,
            machine: scope.machine,
        };
        crate::dispatch::exec_create(&mut child_scope, target, code)
    };

    if create_error.is_none() {
        if let Err(error) = child.sync() {
            return (
                output,
                Some(Error::Internal(format!(
                    "frame sync failed: {}",
                    error
                ))),
            );
        }
    } else {
        drop(child);
    }

    (output, create_error)
}
