// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The contract execution engine: a polymorphic call dispatcher routing
//! messages between externally-owned accounts, native contracts, EVM
//! bytecode and eWASM modules, over a stack of transactional state frames.

#[macro_use]
extern crate log;

mod call;
mod context;
mod dispatch;
mod events;
mod executive;
mod machine;
mod natives;
mod permissions;
mod state;
mod wasm;

pub use call::{call, call_from_site, transfer, use_gas, CallScope};
pub use context::FrameContext;
pub use dispatch::{Callable, Dispatcher, Externals, NoopExec};
pub use events::{
    CallEvent, CollectingEventSink, Event, EventSink, LogEvent,
    LogFreeEventSink, NoopEventSink,
};
pub use executive::Executive;
pub use machine::Machine;
pub use natives::{
    abi, permissions_contract::permissions_contract, NativeContract,
    NativeFunction, Precompile,
};
pub use permissions::{
    ensure_permission, has_permission, AccountPermissions, BasePermissions,
    PermFlag,
};
pub use state::{
    Account, Backend, CallFrame, MemoryState, RootLayer, StateLayer,
};
pub use wasm::WasmVm;
