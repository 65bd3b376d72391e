// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::*;
use crate::{
    events::CollectingEventSink,
    permissions,
    state::MemoryState,
};
use rustc_hex::FromHex;
use warren_types::{u64_to_word256, Address, Word256};

fn address(n: u64) -> Address { Address::from_low_u64_be(n) }

fn account_with_all_perms(addr: Address, balance: u64) -> Account {
    let mut account = Account::new(addr);
    account.balance = balance;
    account
        .permissions
        .base
        .set(permissions::ALL_PERM_FLAGS, true);
    account
}

fn evm_account(addr: Address, code_hex: &str) -> Account {
    let mut account = Account::new(addr);
    account.code = code_hex.from_hex().unwrap();
    account
}

fn machine() -> Machine {
    Machine::new_with_natives(Spec::genesis_spec())
}

const GAS: u64 = 1_000_000;

fn transact(
    store: &mut MemoryState, sink: &mut CollectingEventSink,
    params: CallParams,
) -> (Bytes, Option<Error>) {
    let machine = machine();
    let env = Env::default();
    let mut executive = Executive::new(store, &env, &machine);
    executive.transact(sink, params)
}

#[test]
fn plain_value_transfer() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 500))
        .unwrap();
    store.update_account(Account::new(address(2))).unwrap();

    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(2),
            origin: address(1),
            value: U256::from(123),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert!(output.is_empty());
    assert_eq!(store.get_account(&address(2)).unwrap().unwrap().balance, 123);
    assert_eq!(store.get_account(&address(1)).unwrap().unwrap().balance, 377);
    assert_eq!(sink.call_events().count(), 1);
}

#[test]
fn transfer_to_fresh_address_creates_account() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 500))
        .unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(99),
            origin: address(1),
            value: U256::from(50),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(
        store.get_account(&address(99)).unwrap().unwrap().balance,
        50
    );
}

#[test]
fn caller_without_call_permission_is_rejected() {
    let mut store = MemoryState::new();
    let mut caller = Account::new(address(1));
    caller.balance = 500;
    store.update_account(caller).unwrap();
    store.update_account(Account::new(address(2))).unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(2),
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    assert!(matches!(error, Some(Error::PermissionDenied { .. })));
}

#[test]
fn call_permission_falls_through_to_global() {
    let mut store = MemoryState::new();
    // The caller has no bits set of its own.
    let mut caller = Account::new(address(1));
    caller.balance = 500;
    store.update_account(caller).unwrap();
    store.update_account(Account::new(address(2))).unwrap();
    // The global account grants Call and Send to everyone.
    let mut global = Account::new(permissions::global_permissions_address());
    global.permissions.base.set(permissions::CALL, true);
    global.permissions.base.set(permissions::SEND, true);
    store.update_account(global).unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(2),
            origin: address(1),
            value: U256::from(9),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(store.get_account(&address(2)).unwrap().unwrap().balance, 9);
}

#[test]
fn revert_rolls_back_storage_and_reports_event() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();
    // Writes 42 to slot 7, then reverts.
    let contract = address(10);
    store
        .update_account(evm_account(contract, "602a60075560006000fd"))
        .unwrap();
    // Pre-existing value in slot 7.
    store
        .set_storage(
            &contract,
            Word256::from_low_u64_be(7),
            Word256::from_low_u64_be(5),
        )
        .unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: contract,
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, Some(Error::ExecutionReverted));
    // The failing frame was discarded; the slot still reads its old value.
    assert_eq!(
        store
            .get_storage(&contract, &Word256::from_low_u64_be(7))
            .unwrap(),
        Word256::from_low_u64_be(5)
    );
    let event = sink.call_events().next().unwrap();
    assert_eq!(event.exception, Some(Error::ExecutionReverted));
}

#[test]
fn committed_contract_write_persists() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();
    // Writes 42 to slot 7 and stops.
    let contract = address(10);
    store
        .update_account(evm_account(contract, "602a600755"))
        .unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: contract,
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(
        store
            .get_storage(&contract, &Word256::from_low_u64_be(7))
            .unwrap(),
        Word256::from_low_u64_be(42)
    );
}

#[test]
fn static_call_blocks_writes_but_parent_continues() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();

    let writer = address(11);
    // Writer attempts SSTORE.
    store
        .update_account(evm_account(writer, "602a600755"))
        .unwrap();

    // Parent STATICCALLs the writer and returns the status word.
    let parent = address(10);
    let parent_code = format!(
        "600060006000600073{}61fffffa600052602060006000f3",
        hex::encode(writer)
    );
    let mut parent_account = evm_account(parent, &parent_code);
    parent_account
        .permissions
        .base
        .set(permissions::CALL, true);
    store.update_account(parent_account).unwrap();

    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: parent,
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    // The sub-call failed, its frame was discarded, the parent completed.
    assert_eq!(error, None);
    assert_eq!(
        U256::from_big_endian(&output),
        U256::zero(),
        "static sub-call must report failure"
    );
    assert_eq!(
        store
            .get_storage(&writer, &Word256::from_low_u64_be(7))
            .unwrap(),
        Word256::zero()
    );
}

#[test]
fn nested_call_moves_data_and_refunds_gas() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();

    // Callee returns the word 7.
    let callee = address(12);
    store
        .update_account(evm_account(
            callee,
            "6007600052602060006000f3",
        ))
        .unwrap();

    // Caller CALLs the callee and returns the callee's word.
    let caller_contract = address(10);
    let caller_code = format!(
        "60206000600060006000 73{} 61ffff f1 50 600051600052602060006000f3",
        hex::encode(callee)
    )
    .replace(' ', "");
    let mut caller_account = evm_account(caller_contract, &caller_code);
    caller_account
        .permissions
        .base
        .set(permissions::CALL, true);
    store.update_account(caller_account).unwrap();

    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: caller_contract,
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(U256::from_big_endian(&output), U256::from(7));
    // Both frames appear in the event stream, child first.
    let depths: Vec<u64> =
        sink.call_events().map(|event| event.stack_depth).collect();
    assert_eq!(depths, vec![1, 0]);
}

#[test]
fn create_installs_returned_code() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 100))
        .unwrap();

    // Init code returning the single byte 0xfe as the contract's code:
    // PUSH1 fe, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN.
    let init_code: Vec<u8> = "60fe60005360016000f3".from_hex().unwrap();
    let expected = cal_contract_address(
        CreateContractAddressType::FromSenderNonce,
        &address(1),
        &U256::zero(),
        &init_code,
    )
    .0;

    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            call_type: CallType::Create,
            caller: address(1),
            origin: address(1),
            input: init_code,
            value: U256::from(30),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(output, vec![0xfe]);

    let created = store.get_account(&expected).unwrap().unwrap();
    assert_eq!(created.code, vec![0xfe]);
    assert_eq!(created.balance, 30);
    assert_eq!(
        store.get_account(&address(1)).unwrap().unwrap().sequence,
        1
    );
}

#[test]
fn insufficient_intrinsic_gas_fails_up_front() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();
    store.update_account(Account::new(address(2))).unwrap();

    let mut sink = CollectingEventSink::new();
    let (_, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(2),
            origin: address(1),
            gas: 100,
            ..Default::default()
        },
    );
    assert_eq!(error, Some(Error::InsufficientGas));
    assert!(sink.events.is_empty());
}

#[test]
fn native_contract_reachable_through_transact() {
    use crate::natives::{abi, abi::AbiValue};

    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();
    let contract_address = *crate::natives::permissions_contract::PERMISSIONS_CONTRACT_ADDRESS;
    store
        .update_account(Account::new(contract_address))
        .unwrap();

    let input = abi::encode_call(
        "setBase(address,uint64,bool)",
        &[
            AbiValue::Address(address(2)),
            AbiValue::Uint64(permissions::BOND),
            AbiValue::Bool(true),
        ],
    );
    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: contract_address,
            origin: address(1),
            input,
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(output, u64_to_word256(permissions::BOND).as_bytes());
    let grantee = store.get_account(&address(2)).unwrap().unwrap();
    assert_eq!(grantee.permissions.base.get(permissions::BOND), Some(true));
}

#[test]
fn explicit_code_execution_interface() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();
    store.update_account(Account::new(address(2))).unwrap();

    let machine = machine();
    let env = Env {
        chain_id: 5,
        number: 77,
        timestamp: 1_700_000_000,
    };
    let mut executive = Executive::new(&mut store, &env, &machine);
    let mut sink = CollectingEventSink::new();

    // NUMBER, PUSH1 0, MSTORE, RETURN 32 bytes.
    let code: Vec<u8> = "43600052602060006000f3".from_hex().unwrap();
    let (output, error) = executive.execute(
        &mut sink,
        CallParams {
            caller: address(1),
            callee: address(2),
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
        &code,
    );
    assert_eq!(error, None);
    assert_eq!(U256::from_big_endian(&output), U256::from(77));
}

#[test]
fn wasm_contract_calls_evm_contract() {
    let mut store = MemoryState::new();
    store
        .update_account(account_with_all_perms(address(1), 0))
        .unwrap();

    // EVM callee returning the word 7.
    let evm_callee = Address::from([0x0b; 20]);
    store
        .update_account(evm_account(evm_callee, "6007600052602060006000f3"))
        .unwrap();

    // WASM caller: calls the EVM contract and finishes with its return
    // data. The callee address sits in linear memory at offset 0; the
    // 128-bit little-endian value at offset 32 stays zero.
    let wat = format!(
        r#"
        (module
          (import "ethereum" "call"
            (func $call (param i64 i32 i32 i32 i32) (result i32)))
          (import "ethereum" "getReturnDataSize" (func $rds (result i32)))
          (import "ethereum" "returnDataCopy" (func $rdc (param i32 i32 i32)))
          (import "ethereum" "finish" (func $finish (param i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 0) "{}")
          (func (export "main")
            (drop (call $call (i64.const 100000) (i32.const 0) (i32.const 32)
                              (i32.const 0) (i32.const 0)))
            (call $rdc (i32.const 64) (i32.const 0) (call $rds))
            (call $finish (i32.const 64) (call $rds))))
        "#,
        "\\0b".repeat(20)
    );
    let wasm_caller = address(20);
    let mut wasm_account = Account::new(wasm_caller);
    wasm_account.wasm_code = wat.into_bytes();
    wasm_account.permissions.base.set(permissions::CALL, true);
    store.update_account(wasm_account).unwrap();

    let mut sink = CollectingEventSink::new();
    let (output, error) = transact(
        &mut store,
        &mut sink,
        CallParams {
            caller: address(1),
            callee: wasm_caller,
            origin: address(1),
            gas: GAS,
            ..Default::default()
        },
    );
    assert_eq!(error, None);
    assert_eq!(U256::from_big_endian(&output), U256::from(7));
    // Two call events: the EVM child frame, then the WASM root frame.
    let depths: Vec<u64> =
        sink.call_events().map(|event| event.stack_depth).collect();
    assert_eq!(depths, vec![1, 0]);
}
