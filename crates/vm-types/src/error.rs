// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use std::fmt;
use warren_types::Address;

/// VM errors. The set of codes is closed; every failure an executor can
/// produce maps onto exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The account lacks a required permission bit, after global
    /// fall-through.
    PermissionDenied {
        address: Address,
        /// The permission mask that was required. All bits must be set.
        perm: u64,
    },
    /// The gas cell cannot cover the attempted charge.
    InsufficientGas,
    /// The sender's balance cannot cover the attempted transfer.
    InsufficientBalance { address: Address },
    /// Opening a frame would exceed the configured maximum call depth.
    CallStackOverflow,
    /// Memory expansion beyond the configured bound.
    OutOfMemory,
    /// The target account does not exist and the call type does not permit
    /// implicit creation.
    UnknownAddress(Address),
    /// The address is occupied by a contract and cannot be reused.
    InvalidAddress(Address),
    /// The account's code is not a runnable contract.
    InvalidContract(String),
    /// The module imports symbols the host does not provide, or lacks the
    /// required entry point.
    UnresolvedSymbols,
    /// Explicit revert. Rolls back the current frame only; the caller
    /// observes failure and may continue.
    ExecutionReverted,
    /// The VM stopped in a state it cannot recover from.
    ExecutionAborted,
    /// A native contract rejected the call.
    NativeFunction(String),
    /// State mutation or log emission inside a static frame.
    MutableCallInStaticContext,
    /// Fewer stack items than the instruction consumes. Fatal to the frame.
    StackUnderflow {
        instruction: &'static str,
        wanted: usize,
        on_stack: usize,
    },
    /// Pushing past the stack limit.
    OutOfStack {
        instruction: &'static str,
        wanted: usize,
        limit: usize,
    },
    /// Jump to a position that is not a JUMPDEST.
    BadJumpDestination { destination: usize },
    /// Undefined opcode.
    BadInstruction { instruction: u8 },
    /// Invariant violation. Aborts the whole transaction.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Error::*;
        match self {
            PermissionDenied { address, perm } => write!(
                f,
                "account {:?} lacks permission {:#x}",
                address, perm
            ),
            InsufficientGas => write!(f, "insufficient gas"),
            InsufficientBalance { address } => {
                write!(f, "insufficient balance on {:?}", address)
            }
            CallStackOverflow => write!(f, "call stack overflow"),
            OutOfMemory => write!(f, "out of memory"),
            UnknownAddress(address) => {
                write!(f, "unknown address {:?}", address)
            }
            InvalidAddress(address) => {
                write!(f, "invalid address {:?}", address)
            }
            InvalidContract(msg) => write!(f, "invalid contract: {}", msg),
            UnresolvedSymbols => write!(f, "unresolved symbols"),
            ExecutionReverted => write!(f, "execution reverted"),
            ExecutionAborted => write!(f, "execution aborted"),
            NativeFunction(msg) => write!(f, "native function: {}", msg),
            MutableCallInStaticContext => {
                write!(f, "mutable call in static context")
            }
            StackUnderflow {
                instruction,
                wanted,
                on_stack,
            } => write!(
                f,
                "stack underflow {} {}/{}",
                instruction, wanted, on_stack
            ),
            OutOfStack {
                instruction,
                wanted,
                limit,
            } => {
                write!(f, "out of stack {} {}/{}", instruction, wanted, limit)
            }
            BadJumpDestination { destination } => {
                write!(f, "bad jump destination {:#x}", destination)
            }
            BadInstruction { instruction } => {
                write!(f, "bad instruction {:#x}", instruction)
            }
            Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Accumulates the first error of a fallible sequence.
///
/// Executors perform many fallible steps where the protocol still needs the
/// remaining steps to run (a failed transfer must not suppress the post-call
/// event). Later errors are ignored once one is latched; materialising a
/// typed result while latched yields the type's zero value so cleanup can
/// proceed without branching at every step.
#[derive(Debug, Default)]
pub struct Maybe {
    first: Option<Error>,
}

impl Maybe {
    pub fn new() -> Self { Maybe::default() }

    /// Record `error` unless one is already latched. Returns whether an
    /// error is now latched.
    pub fn push(&mut self, error: Error) -> bool {
        if self.first.is_none() {
            self.first = Some(error);
        }
        true
    }

    /// Record the error of `result`, if any. Returns whether an error is
    /// latched afterwards.
    pub fn push_result<T>(&mut self, result: Result<T>) -> bool {
        if let Err(error) = result {
            self.push(error);
        }
        self.first.is_some()
    }

    /// Extract the value of `result`, latching its error. Once an error is
    /// latched the zero value is returned instead.
    pub fn grab<T: Default>(&mut self, result: Result<T>) -> T {
        match result {
            Ok(value) if self.first.is_none() => value,
            Ok(_) => T::default(),
            Err(error) => {
                self.push(error);
                T::default()
            }
        }
    }

    pub fn error(&self) -> Option<&Error> { self.first.as_ref() }

    pub fn is_latched(&self) -> bool { self.first.is_some() }

    pub fn take(&mut self) -> Option<Error> { self.first.take() }

    /// The accumulated outcome: `Err` with the first error, else `Ok`.
    pub fn result(mut self) -> Result<()> {
        match self.first.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
