// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::permissions::AccountPermissions;
use warren_types::{Address, Bytes};
use warren_vm_types::{Error, Result};

/// An account record. Contract accounts carry exactly one of `code` /
/// `wasm_code`; externally-owned accounts carry neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub balance: u64,
    pub sequence: u64,
    pub code: Bytes,
    pub wasm_code: Bytes,
    pub permissions: AccountPermissions,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Account {
            address,
            ..Default::default()
        }
    }

    pub fn is_contract(&self) -> bool {
        !self.code.is_empty() || !self.wasm_code.is_empty()
    }

    /// Rejects records carrying both code kinds. Checked on every account
    /// update before it reaches an overlay.
    pub fn validate(&self) -> Result<()> {
        if !self.code.is_empty() && !self.wasm_code.is_empty() {
            return Err(Error::InvalidContract(format!(
                "account {:?} has both EVM and WASM code",
                self.address
            )));
        }
        Ok(())
    }
}
