// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The `"ethereum"` host module. Values cross the boundary as little-endian
//! 128-bit words, unlike the big-endian Word256 of the EVM. The one revision
//! of the ABI that read 64-bit call values is not followed here.

use crate::call::{call_from_site, CallScope};
use crate::state::StateLayer;
use byteorder::{ByteOrder, LittleEndian};
use warren_types::{Address, Bytes, Word256, U256};
use warren_vm_types::{CallParams, CallType, Error, WasmConfig};
use wasmtime::{Caller, Linker, Memory, StoreLimits, StoreLimitsBuilder};

const WASM_PAGE_SIZE: u64 = 64 * 1024;

pub(super) enum StopReason {
    Finish,
    Revert,
    Fail(Error),
}

/// Pointers back into the engine for the duration of one `execute`.
///
/// The store outlives neither the scope nor the params it points to: both
/// borrows are held mutably by `WasmVm::execute` for the whole run, and
/// execution is single-threaded, so dereferencing from host functions is
/// exclusive access.
struct EngineBridge {
    scope: *mut CallScope<'static, 'static>,
    params: *mut CallParams,
}

unsafe impl Send for EngineBridge {}
unsafe impl Sync for EngineBridge {}

pub(super) struct HostState {
    input: Bytes,
    code: Bytes,
    callee: Address,
    value: U256,
    pub(super) output: Bytes,
    return_data: Bytes,
    pub(super) stop: Option<StopReason>,
    pub(super) limits: StoreLimits,
    bridge: EngineBridge,
}

impl HostState {
    pub(super) fn new(
        scope: &mut CallScope<'_, '_>, params: &mut CallParams, code: &[u8],
        config: &WasmConfig,
    ) -> Self {
        HostState {
            input: params.input.clone(),
            code: code.to_vec(),
            callee: params.callee,
            value: params.value,
            output: Bytes::new(),
            return_data: Bytes::new(),
            stop: None,
            limits: StoreLimitsBuilder::new()
                .memory_size(
                    (config.max_memory_pages as u64 * WASM_PAGE_SIZE) as usize,
                )
                .memories(1)
                .instances(1)
                .build(),
            bridge: EngineBridge {
                scope: scope as *mut CallScope<'_, '_>
                    as *mut CallScope<'static, 'static>,
                params: params as *mut CallParams,
            },
        }
    }
}

/// The control transfer used by `finish` and `revert` to unwind the VM. The
/// reason itself travels in `HostState::stop`.
#[derive(Debug)]
struct HostStop;

impl std::fmt::Display for HostStop {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("host stop")
    }
}

impl std::error::Error for HostStop {}

fn stop(
    caller: &mut Caller<'_, HostState>, reason: StopReason,
) -> anyhow::Error {
    caller.data_mut().stop = Some(reason);
    anyhow::Error::new(HostStop)
}

fn memory(caller: &mut Caller<'_, HostState>) -> anyhow::Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|export| export.into_memory())
        .ok_or_else(|| anyhow::anyhow!("module does not export memory"))
}

fn read_memory(
    caller: &mut Caller<'_, HostState>, ptr: i32, len: usize,
) -> anyhow::Result<Vec<u8>> {
    let memory = memory(caller)?;
    let data = memory.data(&caller);
    let start = ptr as u32 as usize;
    data.get(start..start + len)
        .map(|slice| slice.to_vec())
        .ok_or_else(|| anyhow::anyhow!("memory read out of bounds"))
}

fn write_memory(
    caller: &mut Caller<'_, HostState>, ptr: i32, bytes: &[u8],
) -> anyhow::Result<()> {
    let memory = memory(caller)?;
    let data = memory.data_mut(caller);
    let start = ptr as u32 as usize;
    let slice = data
        .get_mut(start..start + bytes.len())
        .ok_or_else(|| anyhow::anyhow!("memory write out of bounds"))?;
    slice.copy_from_slice(bytes);
    Ok(())
}

/// Copy a slice of `source` (zero-length tolerated) into VM memory.
fn copy_to_memory(
    caller: &mut Caller<'_, HostState>, source: &[u8], dest: i32, offset: i32,
    len: i32,
) -> anyhow::Result<()> {
    if len == 0 {
        return Ok(());
    }
    let start = offset as u32 as usize;
    let end = start + len as u32 as usize;
    let bytes = source
        .get(start..end)
        .ok_or_else(|| anyhow::anyhow!("source read out of bounds"))?
        .to_vec();
    write_memory(caller, dest, &bytes)
}

/// Little-endian 128-bit rendering of a value, as the ewasm ABI carries it.
fn le_value_bytes(value: U256) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    LittleEndian::write_u128(&mut bytes, value.low_u128());
    bytes
}

macro_rules! engine {
    ($caller:expr) => {{
        let bridge = &$caller.data().bridge;
        // Safety: see `EngineBridge`. Exclusive for the run, single thread.
        unsafe { (&mut *bridge.scope, &mut *bridge.params) }
    }};
}

pub(super) fn register(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
    linker.func_wrap(
        "ethereum",
        "call",
        |mut caller: Caller<'_, HostState>,
         gas_limit: i64,
         addr_ptr: i32,
         value_ptr: i32,
         data_ptr: i32,
         data_len: i32|
         -> anyhow::Result<i32> {
            let address_bytes = read_memory(&mut caller, addr_ptr, 20)?;
            let value_bytes = read_memory(&mut caller, value_ptr, 16)?;
            let input =
                read_memory(&mut caller, data_ptr, data_len as u32 as usize)?;

            let target_address = Address::from_slice(&address_bytes);
            let value =
                U256::from(LittleEndian::read_u128(&value_bytes));

            let (scope, params) = engine!(caller);
            let target = CallParams {
                call_type: CallType::Call,
                origin: params.origin,
                caller: params.callee,
                callee: target_address,
                input,
                value,
                gas: gas_limit as u64,
            };
            let (return_data, error) =
                call_from_site(scope, params, target);
            caller.data_mut().return_data = return_data;
            Ok(match error {
                None => 0,
                Some(_) => 1,
            })
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getCallDataSize",
        |caller: Caller<'_, HostState>| -> i32 {
            caller.data().input.len() as i32
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "callDataCopy",
        |mut caller: Caller<'_, HostState>,
         dest: i32,
         offset: i32,
         len: i32|
         -> anyhow::Result<()> {
            let input = caller.data().input.clone();
            copy_to_memory(&mut caller, &input, dest, offset, len)
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getReturnDataSize",
        |caller: Caller<'_, HostState>| -> i32 {
            caller.data().return_data.len() as i32
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "returnDataCopy",
        |mut caller: Caller<'_, HostState>,
         dest: i32,
         offset: i32,
         len: i32|
         -> anyhow::Result<()> {
            let return_data = caller.data().return_data.clone();
            copy_to_memory(&mut caller, &return_data, dest, offset, len)
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getCodeSize",
        |caller: Caller<'_, HostState>| -> i32 {
            caller.data().code.len() as i32
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "codeCopy",
        |mut caller: Caller<'_, HostState>,
         dest: i32,
         offset: i32,
         len: i32|
         -> anyhow::Result<()> {
            let code = caller.data().code.clone();
            copy_to_memory(&mut caller, &code, dest, offset, len)
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "storageStore",
        |mut caller: Caller<'_, HostState>,
         key_ptr: i32,
         value_ptr: i32|
         -> anyhow::Result<()> {
            let key = read_memory(&mut caller, key_ptr, 32)?;
            let value = read_memory(&mut caller, value_ptr, 32)?;
            let callee = caller.data().callee;
            let (scope, _) = engine!(caller);
            let result = scope.frame.set_storage(
                &callee,
                Word256::from_slice(&key),
                Word256::from_slice(&value),
            );
            if let Err(error) = result {
                return Err(stop(&mut caller, StopReason::Fail(error)));
            }
            Ok(())
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "storageLoad",
        |mut caller: Caller<'_, HostState>,
         key_ptr: i32,
         dest_ptr: i32|
         -> anyhow::Result<()> {
            let key = read_memory(&mut caller, key_ptr, 32)?;
            let callee = caller.data().callee;
            let (scope, _) = engine!(caller);
            let value = match scope
                .frame
                .get_storage(&callee, &Word256::from_slice(&key))
            {
                Ok(value) => value,
                Err(error) => {
                    return Err(stop(&mut caller, StopReason::Fail(error)))
                }
            };
            write_memory(&mut caller, dest_ptr, value.as_bytes())
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "finish",
        |mut caller: Caller<'_, HostState>,
         data_ptr: i32,
         len: i32|
         -> anyhow::Result<()> {
            let output =
                read_memory(&mut caller, data_ptr, len as u32 as usize)?;
            caller.data_mut().output = output;
            Err(stop(&mut caller, StopReason::Finish))
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "revert",
        |mut caller: Caller<'_, HostState>,
         data_ptr: i32,
         len: i32|
         -> anyhow::Result<()> {
            let output =
                read_memory(&mut caller, data_ptr, len as u32 as usize)?;
            caller.data_mut().output = output;
            Err(stop(&mut caller, StopReason::Revert))
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getAddress",
        |mut caller: Caller<'_, HostState>,
         dest_ptr: i32|
         -> anyhow::Result<()> {
            let callee = caller.data().callee;
            write_memory(&mut caller, dest_ptr, callee.as_bytes())
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getCallValue",
        |mut caller: Caller<'_, HostState>,
         dest_ptr: i32|
         -> anyhow::Result<()> {
            let bytes = le_value_bytes(caller.data().value);
            write_memory(&mut caller, dest_ptr, &bytes)
        },
    )?;

    linker.func_wrap(
        "ethereum",
        "getExternalBalance",
        |mut caller: Caller<'_, HostState>,
         addr_ptr: i32,
         dest_ptr: i32|
         -> anyhow::Result<()> {
            let address_bytes = read_memory(&mut caller, addr_ptr, 20)?;
            let address = Address::from_slice(&address_bytes);
            let (scope, _) = engine!(caller);
            let account = match scope.frame.get_account(&address) {
                Ok(account) => account,
                Err(error) => {
                    return Err(stop(&mut caller, StopReason::Fail(error)))
                }
            };
            let balance = match account {
                Some(account) => account.balance,
                None => {
                    return Err(stop(
                        &mut caller,
                        StopReason::Fail(Error::InvalidAddress(address)),
                    ))
                }
            };
            let bytes = le_value_bytes(U256::from(balance));
            write_memory(&mut caller, dest_ptr, &bytes)
        },
    )?;

    Ok(())
}
