// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The interpreter's view of the engine: storage and account access on the
//! current frame, log buffering, and re-entry into the call protocol for
//! CALL/CREATE-family instructions.

use crate::{
    call::{call_from_site, create_from_site, CallScope},
    events::LogEvent,
    permissions,
    state::StateLayer,
};
use keccak_hash::keccak;
use warren_types::{
    cal_contract_address, Address, Bytes, CreateContractAddressType, Word256,
    U256,
};
use warren_vm_types::{
    CallParams, CallType, Context, ContractCreateResult, Env, Error,
    MessageCallResult, Result, Spec,
};

pub struct FrameContext<'a, 'b, 'f> {
    scope: &'a mut CallScope<'b, 'f>,
    /// Identity of the running frame; the gas field is not authoritative
    /// here, the interpreter's gasometer is.
    params: CallParams,
}

impl<'a, 'b, 'f> FrameContext<'a, 'b, 'f> {
    pub fn new(scope: &'a mut CallScope<'b, 'f>, params: CallParams) -> Self {
        FrameContext { scope, params }
    }
}

impl Context for FrameContext<'_, '_, '_> {
    fn spec(&self) -> &Spec { self.scope.machine.spec() }

    fn env(&self) -> &Env { self.scope.env }

    fn depth(&self) -> u64 { self.scope.frame.depth() }

    fn is_static(&self) -> bool { self.scope.frame.is_read_only() }

    fn balance(&mut self, address: &Address) -> Result<U256> {
        Ok(self
            .scope
            .frame
            .get_account(address)?
            .map_or_else(U256::zero, |account| U256::from(account.balance)))
    }

    fn exists(&mut self, address: &Address) -> Result<bool> {
        Ok(self.scope.frame.get_account(address)?.is_some())
    }

    fn storage_at(&mut self, key: &Word256) -> Result<Word256> {
        self.scope.frame.get_storage(&self.params.callee, key)
    }

    fn set_storage(&mut self, key: Word256, value: Word256) -> Result<()> {
        self.scope
            .frame
            .set_storage(&self.params.callee, key, value)
    }

    fn extcode(&mut self, address: &Address) -> Result<Bytes> {
        Ok(self
            .scope
            .frame
            .get_account(address)?
            .map_or_else(Bytes::new, |account| account.code))
    }

    fn extcodesize(&mut self, address: &Address) -> Result<usize> {
        Ok(self
            .scope
            .frame
            .get_account(address)?
            .map_or(0, |account| account.code.len()))
    }

    fn extcodehash(&mut self, address: &Address) -> Result<Word256> {
        Ok(self
            .scope
            .frame
            .get_account(address)?
            .map_or_else(Word256::zero, |account| keccak(&account.code)))
    }

    fn log(&mut self, topics: Vec<Word256>, data: &[u8]) -> Result<()> {
        self.scope.frame.push_log(LogEvent {
            address: self.params.callee,
            topics,
            data: data.to_vec(),
        })
    }

    fn call(
        &mut self, gas: u64, sender: &Address, _receiver: &Address,
        value: Option<U256>, data: &[u8], code_address: &Address,
        call_type: CallType,
    ) -> Result<MessageCallResult> {
        let get_account_gas = self.spec().get_account_gas;
        // The gasometer charged `gas` plus the fixed lookup cost; the site
        // cell carries both so the protocol's own charge nets out.
        let mut site = CallParams {
            call_type,
            origin: self.params.origin,
            caller: self.params.caller,
            callee: self.params.callee,
            input: Bytes::new(),
            value: self.params.value,
            gas: gas + get_account_gas,
        };
        // A delegate call presents the current frame's apparent value
        // without transferring it.
        let apparent_value = if call_type == CallType::DelegateCall {
            self.params.value
        } else {
            value.unwrap_or_default()
        };
        let target = CallParams {
            call_type,
            origin: site.origin,
            caller: *sender,
            callee: *code_address,
            input: data.to_vec(),
            value: apparent_value,
            gas,
        };

        let (output, error) =
            call_from_site(self.scope, &mut site, target);
        Ok(match error {
            None => MessageCallResult::Success {
                gas_left: site.gas,
                return_data: output.into(),
            },
            Some(Error::ExecutionReverted) => MessageCallResult::Reverted {
                gas_left: site.gas,
                return_data: output.into(),
            },
            Some(error) => MessageCallResult::Failed(error),
        })
    }

    fn create(
        &mut self, gas: u64, value: &U256, code: &[u8],
        address_scheme: CreateContractAddressType,
    ) -> Result<ContractCreateResult> {
        let creator = self.params.callee;
        if let Err(error) = permissions::ensure_permission(
            self.scope.frame,
            &creator,
            permissions::CREATE_CONTRACT,
        ) {
            return Ok(ContractCreateResult::Failed(error));
        }

        let nonce = self
            .scope
            .frame
            .get_account(&creator)?
            .map_or(0, |account| account.sequence);
        let (address, _code_hash) = cal_contract_address(
            address_scheme,
            &creator,
            &U256::from(nonce),
            code,
        );
        self.scope
            .frame
            .update_account_with(&creator, |account| account.sequence += 1)?;

        if let Some(existing) = self.scope.frame.get_account(&address)? {
            if existing.is_contract() {
                return Ok(ContractCreateResult::Failed(
                    Error::InvalidAddress(address),
                ));
            }
        }

        let mut target = CallParams {
            call_type: if matches!(
                address_scheme,
                CreateContractAddressType::FromSenderNonce
            ) {
                CallType::Create
            } else {
                CallType::Create2
            },
            origin: self.params.origin,
            caller: creator,
            callee: address,
            input: Bytes::new(),
            value: *value,
            gas,
        };

        let (output, error) =
            create_from_site(self.scope, &mut target, code);
        Ok(match error {
            None => ContractCreateResult::Created {
                address,
                gas_left: target.gas,
            },
            Some(Error::ExecutionReverted) => ContractCreateResult::Reverted {
                gas_left: target.gas,
                return_data: output.into(),
            },
            Some(error) => ContractCreateResult::Failed(error),
        })
    }

    fn suicide(&mut self, refund_address: &Address) -> Result<()> {
        let contract = self.params.callee;
        let balance = self
            .scope
            .frame
            .get_account(&contract)?
            .map_or(0, |account| account.balance);
        if balance > 0 && refund_address != &contract {
            permissions::ensure_permission(
                self.scope.frame,
                &contract,
                permissions::SEND,
            )?;
            self.scope
                .frame
                .update_account_with(refund_address, |account| {
                    account.balance = account.balance.saturating_add(balance)
                })?;
        }
        self.scope.frame.remove_account(&contract)
    }
}
