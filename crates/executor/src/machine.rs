// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    dispatch::{
        Callable, CodeDispatcher, Dispatcher, Externals, NativesDispatcher,
        NoopExec,
    },
    natives::{
        permissions_contract::permissions_contract, precompile_map,
        NativeContract, Precompile,
    },
    state::Account,
    wasm::WasmVm,
};
use std::{collections::BTreeMap, sync::Arc};
use warren_types::Address;
use warren_vm_types::Spec;

/// The static half of the execution engine: the gas schedule, the
/// native-contract registries and the dispatcher stack mapping accounts to
/// executors.
pub struct Machine {
    spec: Spec,
    natives: Arc<BTreeMap<Address, NativeContract>>,
    precompiles: Arc<BTreeMap<Address, Precompile>>,
    externals: Externals,
}

impl Machine {
    /// A machine without any built-in contracts registered.
    pub fn new(spec: Spec) -> Machine {
        Machine::assemble(spec, BTreeMap::new(), BTreeMap::new())
    }

    /// The production machine: permission natives and crypto precompiles.
    pub fn new_with_natives(spec: Spec) -> Machine {
        let contract = permissions_contract();
        let mut natives = BTreeMap::new();
        natives.insert(contract.address, contract);
        Machine::assemble(spec, natives, precompile_map())
    }

    fn assemble(
        spec: Spec, natives: BTreeMap<Address, NativeContract>,
        precompiles: BTreeMap<Address, Precompile>,
    ) -> Machine {
        let natives = Arc::new(natives);
        let precompiles = Arc::new(precompiles);
        let wasm_vm = Arc::new(WasmVm::new(&spec.wasm));

        let mut externals = Externals::new();
        externals.push(Box::new(NativesDispatcher {
            contracts: natives.clone(),
            precompiles: precompiles.clone(),
        }));
        externals.push(Box::new(CodeDispatcher { wasm_vm }));

        Machine {
            spec,
            natives,
            precompiles,
            externals,
        }
    }

    pub fn spec(&self) -> &Spec { &self.spec }

    pub fn native(&self, address: &Address) -> Option<&NativeContract> {
        self.natives.get(address)
    }

    pub fn precompile(&self, address: &Address) -> Option<&Precompile> {
        self.precompiles.get(address)
    }

    /// Select the callable for `account`: registered natives first, then
    /// stored code, then the pure value-transfer no-op.
    pub fn dispatch(&self, account: &Account) -> Box<dyn Callable + '_> {
        match self.externals.dispatch(account) {
            Some(callable) => callable,
            None => Box::new(NoopExec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_types::Bytes;
    use warren_vm_types::CallParams;

    #[test]
    fn dispatch_order_native_wasm_evm_noop() {
        let machine = Machine::new_with_natives(Spec::genesis_spec());

        let native_address = permissions_contract().address;
        let mut account = Account::new(native_address);
        // A native address wins even if code is somehow present.
        account.code = vec![0x60];
        assert!(machine.externals.dispatch(&account).is_some());

        let mut wasm_account = Account::new(Address::from_low_u64_be(50));
        wasm_account.wasm_code = vec![0x00, 0x61, 0x73, 0x6d];
        assert!(machine.externals.dispatch(&wasm_account).is_some());

        let mut evm_account = Account::new(Address::from_low_u64_be(51));
        evm_account.code = vec![0x60, 0x00];
        assert!(machine.externals.dispatch(&evm_account).is_some());

        let plain = Account::new(Address::from_low_u64_be(52));
        assert!(machine.externals.dispatch(&plain).is_none());
        // The machine falls back to the no-op transfer callable.
        let _noop: Box<dyn Callable + '_> = machine.dispatch(&plain);
    }

    #[test]
    fn noop_callable_returns_empty_output() {
        use crate::{
            call::CallScope,
            events::NoopEventSink,
            state::{CallFrame, MemoryState, RootLayer},
        };
        use warren_vm_types::Env;

        let machine = Machine::new(Spec::genesis_spec());
        let mut store = MemoryState::new();
        let mut sink = NoopEventSink;
        let env = Env::default();
        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 4);
        let mut scope = CallScope {
            frame: &mut frame,
            sink: &mut sink,
            env: &env,
            machine: &machine,
        };
        let plain = Account::new(Address::from_low_u64_be(9));
        let callable = machine.dispatch(&plain);
        let mut params = CallParams {
            gas: 100,
            ..Default::default()
        };
        let (output, error) = callable.call(&mut scope, &mut params);
        assert_eq!(output, Bytes::new());
        assert_eq!(error, None);
        assert_eq!(params.gas, 100);
    }
}
