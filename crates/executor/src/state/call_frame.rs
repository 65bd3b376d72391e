// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Write-through overlays with frame semantics. Each frame records its
//! mutations privately; `sync` merges them one level up, dropping a frame
//! discards them. No state change survives a frame that was not synced.

use super::{Account, Backend};
use crate::{
    events::{EventSink, LogEvent},
    permissions,
};
use std::collections::HashMap;
use warren_types::{Address, Word256};
use warren_vm_types::{Error, Result};

/// Mutations recorded by one frame: account writes (`None` marks removal),
/// storage writes (the zero word shadows parent values and deletes at the
/// base), and buffered log events.
#[derive(Debug, Default)]
pub struct FrameDelta {
    accounts: HashMap<Address, Option<Account>>,
    storage: HashMap<(Address, Word256), Word256>,
    logs: Vec<LogEvent>,
}

/// A layer a child frame can read through and sync into: another frame, or
/// the root binding of base store and event sink.
pub trait StateLayer {
    fn get_account(&self, address: &Address) -> Result<Option<Account>>;

    fn get_storage(
        &self, address: &Address, key: &Word256,
    ) -> Result<Word256>;

    /// Merge a synced child's mutations into this layer, append-only and in
    /// order.
    fn absorb(&mut self, delta: FrameDelta) -> Result<()>;
}

/// The bottom of the frame chain for one transaction: commits account and
/// storage writes to the base store and holds the committed logs until they
/// are flushed to the event sink.
pub struct RootLayer<'a> {
    store: &'a mut dyn Backend,
    logs: Vec<LogEvent>,
}

impl<'a> RootLayer<'a> {
    pub fn new(store: &'a mut dyn Backend) -> Self {
        RootLayer {
            store,
            logs: Vec::new(),
        }
    }

    /// Hand the committed logs to the transaction sink, in emission order.
    pub fn flush_logs(&mut self, sink: &mut dyn EventSink) -> Result<()> {
        for log in std::mem::take(&mut self.logs) {
            sink.log(log)?;
        }
        Ok(())
    }
}

impl StateLayer for RootLayer<'_> {
    fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        self.store.get_account(address)
    }

    fn get_storage(
        &self, address: &Address, key: &Word256,
    ) -> Result<Word256> {
        self.store.get_storage(address, key)
    }

    fn absorb(&mut self, delta: FrameDelta) -> Result<()> {
        for (address, entry) in delta.accounts {
            match entry {
                Some(account) => self.store.update_account(account)?,
                None => self.store.remove_account(&address)?,
            }
        }
        for ((address, key), value) in delta.storage {
            self.store.set_storage(&address, key, value)?;
        }
        self.logs.extend(delta.logs);
        Ok(())
    }
}

/// One scope of state mutations with its own depth and mutability mode.
pub struct CallFrame<'a> {
    parent: &'a mut dyn StateLayer,
    delta: FrameDelta,
    depth: u64,
    max_call_depth: u64,
    read_only: bool,
}

impl<'a> CallFrame<'a> {
    /// Open the root frame of a transaction at depth zero.
    pub fn new(parent: &'a mut dyn StateLayer, max_call_depth: u64) -> Self {
        CallFrame {
            parent,
            delta: FrameDelta::default(),
            depth: 0,
            max_call_depth,
            read_only: false,
        }
    }

    /// Open a child frame one level deeper. Children of a read-only frame
    /// are read-only themselves.
    pub fn new_frame(&mut self) -> Result<CallFrame<'_>> {
        if self.depth + 1 > self.max_call_depth {
            return Err(Error::CallStackOverflow);
        }
        let (depth, max_call_depth, read_only) =
            (self.depth + 1, self.max_call_depth, self.read_only);
        Ok(CallFrame {
            parent: self,
            delta: FrameDelta::default(),
            depth,
            max_call_depth,
            read_only,
        })
    }

    /// Mark this frame read-only; every mutating operation and log emission
    /// fails from here on, in this frame and all its descendants.
    pub fn set_read_only(&mut self) { self.read_only = true; }

    pub fn is_read_only(&self) -> bool { self.read_only }

    pub fn depth(&self) -> u64 { self.depth }

    /// Merge this frame's mutations into its parent. Dropping the frame
    /// instead discards them all.
    pub fn sync(self) -> Result<()> {
        let CallFrame { parent, delta, .. } = self;
        parent.absorb(delta)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::MutableCallInStaticContext)
        } else {
            Ok(())
        }
    }

    /// Write the account record, validating it first.
    pub fn update_account(&mut self, account: Account) -> Result<()> {
        self.ensure_writable()?;
        account.validate()?;
        self.delta.accounts.insert(account.address, Some(account));
        Ok(())
    }

    /// Read-modify-write: loads the current record (a zero account if
    /// absent), applies `f`, and writes it back.
    pub fn update_account_with<F>(
        &mut self, address: &Address, f: F,
    ) -> Result<Account>
    where F: FnOnce(&mut Account) {
        let mut account = self
            .get_account(address)?
            .unwrap_or_else(|| Account::new(*address));
        f(&mut account);
        self.update_account(account.clone())?;
        Ok(account)
    }

    pub fn remove_account(&mut self, address: &Address) -> Result<()> {
        self.ensure_writable()?;
        self.delta.accounts.insert(*address, None);
        Ok(())
    }

    pub fn set_storage(
        &mut self, address: &Address, key: Word256, value: Word256,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.delta.storage.insert((*address, key), value);
        Ok(())
    }

    /// Create a fresh account at `address` on behalf of `creator`, who must
    /// hold both `Send` and `CreateAccount`.
    pub fn create_account(
        &mut self, creator: &Address, address: &Address,
    ) -> Result<()> {
        permissions::ensure_permission(self, creator, permissions::SEND)?;
        permissions::ensure_permission(
            self,
            creator,
            permissions::CREATE_ACCOUNT,
        )?;
        if let Some(existing) = self.get_account(address)? {
            if existing.is_contract() {
                return Err(Error::InvalidAddress(*address));
            }
        }
        self.update_account(Account::new(*address))
    }

    /// Buffer a log event on this frame. Static frames reject logs the way
    /// a log-free sink does.
    pub fn push_log(&mut self, log: LogEvent) -> Result<()> {
        self.ensure_writable()?;
        self.delta.logs.push(log);
        Ok(())
    }
}

impl StateLayer for CallFrame<'_> {
    fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        match self.delta.accounts.get(address) {
            Some(entry) => Ok(entry.clone()),
            None => self.parent.get_account(address),
        }
    }

    fn get_storage(
        &self, address: &Address, key: &Word256,
    ) -> Result<Word256> {
        match self.delta.storage.get(&(*address, *key)) {
            Some(value) => Ok(*value),
            None => self.parent.get_storage(address, key),
        }
    }

    fn absorb(&mut self, delta: FrameDelta) -> Result<()> {
        // Child wins on conflicting keys; logs append in emission order.
        self.delta.accounts.extend(delta.accounts);
        self.delta.storage.extend(delta.storage);
        self.delta.logs.extend(delta.logs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::CollectingEventSink, state::MemoryState};

    fn address(n: u64) -> Address { Address::from_low_u64_be(n) }

    fn word(n: u64) -> Word256 { Word256::from_low_u64_be(n) }

    fn grant_all(store: &mut MemoryState, addr: Address) {
        let mut account = Account::new(addr);
        account
            .permissions
            .base
            .set(permissions::ALL_PERM_FLAGS, true);
        store.update_account(account).unwrap();
    }

    #[test]
    fn unsynced_frame_leaves_no_trace() {
        let mut store = MemoryState::new();
        let mut root = RootLayer::new(&mut store);
        {
            let mut frame = CallFrame::new(&mut root, 16);
            frame
                .set_storage(&address(1), word(7), word(42))
                .unwrap();
            frame
                .update_account_with(&address(1), |account| {
                    account.balance = 5
                })
                .unwrap();
            // Dropped without sync.
        }
        assert_eq!(
            store.get_storage(&address(1), &word(7)).unwrap(),
            Word256::zero()
        );
        assert!(store.get_account(&address(1)).unwrap().is_none());
    }

    #[test]
    fn synced_frames_commit_depth_first() {
        let mut store = MemoryState::new();
        {
            let mut root = RootLayer::new(&mut store);
            let mut frame = CallFrame::new(&mut root, 16);
            frame.set_storage(&address(1), word(1), word(10)).unwrap();
            {
                let mut child = frame.new_frame().unwrap();
                assert_eq!(child.depth(), 1);
                child.set_storage(&address(1), word(1), word(20)).unwrap();
                // Child sees its own write, parent value shadowed.
                assert_eq!(
                    child.get_storage(&address(1), &word(1)).unwrap(),
                    word(20)
                );
                child.sync().unwrap();
            }
            assert_eq!(
                frame.get_storage(&address(1), &word(1)).unwrap(),
                word(20)
            );
            frame.sync().unwrap();
        }
        assert_eq!(
            store.get_storage(&address(1), &word(1)).unwrap(),
            word(20)
        );
    }

    #[test]
    fn discarded_child_does_not_leak_into_parent() {
        let mut store = MemoryState::new();
        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 16);
        frame.set_storage(&address(1), word(1), word(10)).unwrap();
        {
            let mut child = frame.new_frame().unwrap();
            child.set_storage(&address(1), word(1), word(99)).unwrap();
            // Dropped.
        }
        assert_eq!(
            frame.get_storage(&address(1), &word(1)).unwrap(),
            word(10)
        );
    }

    #[test]
    fn depth_limit_overflows() {
        let mut store = MemoryState::new();
        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 1);
        let mut child = frame.new_frame().unwrap();
        assert_eq!(
            child.new_frame().err(),
            Some(Error::CallStackOverflow)
        );
    }

    #[test]
    fn read_only_frames_reject_mutation_and_inherit() {
        let mut store = MemoryState::new();
        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 16);
        frame.set_read_only();
        assert_eq!(
            frame.set_storage(&address(1), word(1), word(1)).err(),
            Some(Error::MutableCallInStaticContext)
        );
        assert_eq!(
            frame
                .push_log(LogEvent {
                    address: address(1),
                    topics: vec![],
                    data: vec![],
                })
                .err(),
            Some(Error::MutableCallInStaticContext)
        );
        let mut child = frame.new_frame().unwrap();
        assert!(child.is_read_only());
        assert_eq!(
            child.update_account(Account::new(address(2))).err(),
            Some(Error::MutableCallInStaticContext)
        );
    }

    #[test]
    fn create_account_requires_permissions() {
        let mut store = MemoryState::new();
        grant_all(&mut store, address(1));
        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 16);

        // No permissions at all on address 2.
        assert!(matches!(
            frame.create_account(&address(2), &address(3)),
            Err(Error::PermissionDenied { .. })
        ));
        frame.create_account(&address(1), &address(3)).unwrap();
        assert!(frame.get_account(&address(3)).unwrap().is_some());
    }

    #[test]
    fn create_account_rejects_contract_addresses() {
        let mut store = MemoryState::new();
        grant_all(&mut store, address(1));
        let mut contract = Account::new(address(9));
        contract.code = vec![0x60, 0x00];
        store.update_account(contract).unwrap();

        let mut root = RootLayer::new(&mut store);
        let mut frame = CallFrame::new(&mut root, 16);
        assert_eq!(
            frame.create_account(&address(1), &address(9)).err(),
            Some(Error::InvalidAddress(address(9)))
        );
    }

    #[test]
    fn logs_flush_to_sink_only_at_root_sync() {
        let mut store = MemoryState::new();
        let mut sink = CollectingEventSink::new();
        let mut root = RootLayer::new(&mut store);
        {
            let mut frame = CallFrame::new(&mut root, 16);
            frame
                .push_log(LogEvent {
                    address: address(1),
                    topics: vec![word(1)],
                    data: vec![0xaa],
                })
                .unwrap();
            let mut child = frame.new_frame().unwrap();
            child
                .push_log(LogEvent {
                    address: address(2),
                    topics: vec![],
                    data: vec![0xbb],
                })
                .unwrap();
            child.sync().unwrap();
            frame.sync().unwrap();
        }
        root.flush_logs(&mut sink).unwrap();
        let logs: Vec<_> = sink.log_events().collect();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].address, address(1));
        assert_eq!(logs[1].address, address(2));
    }
}
