// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The eWASM executor: a sandboxed WASM VM whose only window to the chain
//! is the `"ethereum"` host module registered here.

mod host;

use crate::call::CallScope;
use host::{HostState, StopReason};
use warren_types::Bytes;
use warren_vm_types::{CallParams, Error, WasmConfig};
use wasmtime::{Config, Engine, Linker, Module, Store};

pub struct WasmVm {
    engine: Engine,
    config: WasmConfig,
}

impl WasmVm {
    pub fn new(config: &WasmConfig) -> Self {
        let mut engine_config = Config::new();
        engine_config
            .max_wasm_stack(config.max_call_stack_depth * 256)
            .wasm_relaxed_simd(false)
            .wasm_simd(false)
            .cranelift_nan_canonicalization(config.canonicalize_nans);
        // The configuration above is valid for every wasmtime build we
        // target; fall back to defaults rather than failing the machine.
        let engine = Engine::new(&engine_config).unwrap_or_default();
        WasmVm {
            engine,
            config: config.clone(),
        }
    }

    /// Instantiate `code` and run its exported `main`, converting the
    /// host-initiated unwinds of `finish` and `revert` into results. VM
    /// traps never escape as panics.
    pub fn execute(
        &self, scope: &mut CallScope<'_, '_>, params: &mut CallParams,
        code: &[u8],
    ) -> (Bytes, Option<Error>) {
        let module = match Module::new(&self.engine, code) {
            Ok(module) => module,
            Err(error) => {
                return (
                    Bytes::new(),
                    Some(Error::InvalidContract(format!("ewasm: {}", error))),
                )
            }
        };

        let mut linker = Linker::new(&self.engine);
        if let Err(error) = host::register(&mut linker) {
            return (
                Bytes::new(),
                Some(Error::Internal(format!(
                    "registering host module: {}",
                    error
                ))),
            );
        }

        let state = HostState::new(scope, params, code, &self.config);
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);

        // Imports outside the "ethereum" module are unresolvable by
        // construction and fail instantiation.
        let instance = match linker.instantiate(&mut store, &module) {
            Ok(instance) => instance,
            Err(error) => {
                debug!("ewasm instantiation failed: {}", error);
                return (Bytes::new(), Some(Error::UnresolvedSymbols));
            }
        };

        let main =
            match instance.get_typed_func::<(), ()>(&mut store, "main") {
                Ok(main) => main,
                Err(_) => return (Bytes::new(), Some(Error::UnresolvedSymbols)),
            };

        let run_result = main.call(&mut store, ());
        let state = store.into_data();
        match run_result {
            // Fell off the end of main without calling finish.
            Ok(()) => (state.output, None),
            Err(trap) => match state.stop {
                Some(StopReason::Finish) => (state.output, None),
                Some(StopReason::Revert) => {
                    (state.output, Some(Error::ExecutionReverted))
                }
                Some(StopReason::Fail(error)) => (state.output, Some(error)),
                None => {
                    debug!("ewasm trap: {}", trap);
                    (Bytes::new(), Some(Error::ExecutionAborted))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::NoopEventSink,
        machine::Machine,
        state::{Backend, CallFrame, MemoryState, RootLayer},
    };
    use warren_types::{Address, Word256};
    use warren_vm_types::{Env, Spec};

    fn run_wat(
        wat: &str, input: Vec<u8>, store: &mut MemoryState,
    ) -> (Bytes, Option<Error>, u64) {
        let machine = Machine::new(Spec::genesis_spec());
        let env = Env::default();
        let mut sink = NoopEventSink;
        let mut root = RootLayer::new(store);
        let mut frame = CallFrame::new(&mut root, 16);
        let mut params = CallParams {
            callee: Address::from_low_u64_be(42),
            input,
            gas: 10_000,
            ..Default::default()
        };
        let (output, error) = {
            let mut scope = CallScope {
                frame: &mut frame,
                sink: &mut sink,
                env: &env,
                machine: &machine,
            };
            let vm = WasmVm::new(&machine.spec().wasm);
            vm.execute(&mut scope, &mut params, wat.as_bytes())
        };
        frame.sync().unwrap();
        (output, error, params.gas)
    }

    #[test]
    fn finish_returns_output() {
        let wat = r#"
            (module
              (import "ethereum" "finish" (func $finish (param i32 i32)))
              (memory (export "memory") 1)
              (data (i32.const 0) "\2a")
              (func (export "main")
                (call $finish (i32.const 0) (i32.const 1))))
        "#;
        let mut store = MemoryState::new();
        let (output, error, _) = run_wat(wat, vec![], &mut store);
        assert_eq!(error, None);
        assert_eq!(output, vec![0x2a]);
    }

    #[test]
    fn revert_returns_output_and_error() {
        let wat = r#"
            (module
              (import "ethereum" "revert" (func $revert (param i32 i32)))
              (memory (export "memory") 1)
              (data (i32.const 0) "\aa\bb")
              (func (export "main")
                (call $revert (i32.const 0) (i32.const 2))))
        "#;
        let mut store = MemoryState::new();
        let (output, error, _) = run_wat(wat, vec![], &mut store);
        assert_eq!(error, Some(Error::ExecutionReverted));
        assert_eq!(output, vec![0xaa, 0xbb]);
    }

    #[test]
    fn call_data_copies_into_memory_and_back() {
        // Copy the input into memory and finish with it.
        let wat = r#"
            (module
              (import "ethereum" "getCallDataSize" (func $size (result i32)))
              (import "ethereum" "callDataCopy" (func $copy (param i32 i32 i32)))
              (import "ethereum" "finish" (func $finish (param i32 i32)))
              (memory (export "memory") 1)
              (func (export "main")
                (call $copy (i32.const 0) (i32.const 0) (call $size))
                (call $finish (i32.const 0) (call $size))))
        "#;
        let mut store = MemoryState::new();
        let (output, error, _) =
            run_wat(wat, vec![1, 2, 3, 4, 5], &mut store);
        assert_eq!(error, None);
        assert_eq!(output, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn storage_round_trips_through_host() {
        let wat = r#"
            (module
              (import "ethereum" "storageStore" (func $store (param i32 i32)))
              (import "ethereum" "storageLoad" (func $load (param i32 i32)))
              (import "ethereum" "finish" (func $finish (param i32 i32)))
              (memory (export "memory") 1)
              ;; key at 0, value at 32, loaded copy at 64
              (data (i32.const 31) "\07")
              (data (i32.const 63) "\2a")
              (func (export "main")
                (call $store (i32.const 0) (i32.const 32))
                (call $load (i32.const 0) (i32.const 64))
                (call $finish (i32.const 64) (i32.const 32))))
        "#;
        let mut store = MemoryState::new();
        let (output, error, _) = run_wat(wat, vec![], &mut store);
        assert_eq!(error, None);
        assert_eq!(output, Word256::from_low_u64_be(42).as_bytes());
        assert_eq!(
            store
                .get_storage(
                    &Address::from_low_u64_be(42),
                    &Word256::from_low_u64_be(7)
                )
                .unwrap(),
            Word256::from_low_u64_be(42)
        );
    }

    #[test]
    fn unknown_import_module_is_unresolved() {
        let wat = r#"
            (module
              (import "env" "whatever" (func $f))
              (func (export "main") (call $f)))
        "#;
        let mut store = MemoryState::new();
        let (_, error, _) = run_wat(wat, vec![], &mut store);
        assert_eq!(error, Some(Error::UnresolvedSymbols));
    }

    #[test]
    fn missing_main_is_unresolved() {
        let wat = r#"(module (memory (export "memory") 1))"#;
        let mut store = MemoryState::new();
        let (_, error, _) = run_wat(wat, vec![], &mut store);
        assert_eq!(error, Some(Error::UnresolvedSymbols));
    }
}
