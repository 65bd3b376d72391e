// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use std::fmt;

/// The way a frame was entered. Determines value transfer and the
/// caller/callee rewrite applied before dispatch.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum CallType {
    /// Plain message call to the target's code and storage.
    Call,
    /// Run the target's code against the calling contract's storage.
    CallCode,
    /// Run the target's code with the original caller and the calling
    /// contract's storage; no value transfer.
    DelegateCall,
    /// Plain call with all state mutation and log emission forbidden.
    StaticCall,
    /// Contract creation from sender and nonce.
    Create,
    /// Contract creation from sender, salt and code hash.
    Create2,
}

impl CallType {
    /// Whether the generic call wrapper moves `value` from caller to callee
    /// before executing.
    pub fn transfers_value(self) -> bool {
        matches!(self, CallType::Call | CallType::CallCode)
    }

    pub fn is_create(self) -> bool {
        matches!(self, CallType::Create | CallType::Create2)
    }

    pub fn is_static(self) -> bool { self == CallType::StaticCall }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CallType::Call => "call",
            CallType::CallCode => "callcode",
            CallType::DelegateCall => "delegatecall",
            CallType::StaticCall => "staticcall",
            CallType::Create => "create",
            CallType::Create2 => "create2",
        };
        f.write_str(name)
    }
}
