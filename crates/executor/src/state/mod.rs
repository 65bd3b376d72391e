// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! A caching and frame layer built upon the semantically meaningful
//! persistence interface, providing account and storage access to the
//! execution engine with per-frame commit and discard.

mod account;
mod call_frame;

pub use account::Account;
pub use call_frame::{CallFrame, FrameDelta, RootLayer, StateLayer};

use parking_lot::RwLock;
use std::collections::HashMap;
use warren_types::{Address, Word256};
use warren_vm_types::Result;

/// The persistence seam. Memory-backed in tests; database-backed in a node.
///
/// A storage write of the zero word is a delete, so storage stays canonical
/// at the base.
pub trait Backend {
    fn get_account(&self, address: &Address) -> Result<Option<Account>>;

    fn update_account(&mut self, account: Account) -> Result<()>;

    fn remove_account(&mut self, address: &Address) -> Result<()>;

    fn get_storage(
        &self, address: &Address, key: &Word256,
    ) -> Result<Word256>;

    fn set_storage(
        &mut self, address: &Address, key: Word256, value: Word256,
    ) -> Result<()>;
}

/// In-memory base store. Reads take a shared lock so committed state can be
/// observed concurrently while the executor holds the write lease.
#[derive(Default)]
pub struct MemoryState {
    accounts: RwLock<HashMap<Address, Account>>,
    storage: RwLock<HashMap<(Address, Word256), Word256>>,
}

impl MemoryState {
    pub fn new() -> Self { Self::default() }
}

impl Backend for MemoryState {
    fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        Ok(self.accounts.read().get(address).cloned())
    }

    fn update_account(&mut self, account: Account) -> Result<()> {
        self.accounts.write().insert(account.address, account);
        Ok(())
    }

    fn remove_account(&mut self, address: &Address) -> Result<()> {
        self.accounts.write().remove(address);
        let mut storage = self.storage.write();
        storage.retain(|(owner, _), _| owner != address);
        Ok(())
    }

    fn get_storage(
        &self, address: &Address, key: &Word256,
    ) -> Result<Word256> {
        Ok(self
            .storage
            .read()
            .get(&(*address, *key))
            .copied()
            .unwrap_or_default())
    }

    fn set_storage(
        &mut self, address: &Address, key: Word256, value: Word256,
    ) -> Result<()> {
        let mut storage = self.storage.write();
        if value.is_zero() {
            storage.remove(&(*address, key));
        } else {
            storage.insert((*address, key), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_zero_write_is_a_delete() {
        let mut state = MemoryState::new();
        let address = Address::from_low_u64_be(1);
        let key = Word256::from_low_u64_be(7);

        state
            .set_storage(&address, key, Word256::from_low_u64_be(50_000))
            .unwrap();
        assert_eq!(
            state.get_storage(&address, &key).unwrap(),
            Word256::from_low_u64_be(50_000)
        );

        state.set_storage(&address, key, Word256::zero()).unwrap();
        assert_eq!(state.get_storage(&address, &key).unwrap(), Word256::zero());
        assert!(state.storage.read().is_empty());

        state
            .set_storage(&address, key, Word256::from_low_u64_be(777))
            .unwrap();
        assert_eq!(
            state.get_storage(&address, &key).unwrap(),
            Word256::from_low_u64_be(777)
        );
    }

    #[test]
    fn remove_account_clears_its_storage() {
        let mut state = MemoryState::new();
        let address = Address::from_low_u64_be(2);
        state
            .update_account(Account::new(address))
            .unwrap();
        state
            .set_storage(
                &address,
                Word256::from_low_u64_be(1),
                Word256::from_low_u64_be(9),
            )
            .unwrap();

        state.remove_account(&address).unwrap();
        assert!(state.get_account(&address).unwrap().is_none());
        assert!(state.storage.read().is_empty());
    }
}
