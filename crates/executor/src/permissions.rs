// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Per-account permission bitflags with a process-wide global fallback.

use crate::state::StateLayer;
use warren_types::Address;
use warren_vm_types::{Error, Result};

pub type PermFlag = u64;

pub const SEND: PermFlag = 1 << 0;
pub const CALL: PermFlag = 1 << 1;
pub const CREATE_CONTRACT: PermFlag = 1 << 2;
pub const CREATE_ACCOUNT: PermFlag = 1 << 3;
pub const BOND: PermFlag = 1 << 4;
pub const NAME: PermFlag = 1 << 5;
pub const HAS_ROLE: PermFlag = 1 << 6;
pub const ADD_ROLE: PermFlag = 1 << 7;
pub const REMOVE_ROLE: PermFlag = 1 << 8;
pub const SET_BASE: PermFlag = 1 << 9;
pub const UNSET_BASE: PermFlag = 1 << 10;
pub const SET_GLOBAL: PermFlag = 1 << 11;
pub const PROPOSAL: PermFlag = 1 << 12;

/// Every known permission bit.
pub const ALL_PERM_FLAGS: PermFlag = (1 << 13) - 1;

/// Permissions granted to fresh accounts when the global account says
/// nothing else.
pub const DEFAULT_PERM_FLAGS: PermFlag =
    SEND | CALL | CREATE_CONTRACT | CREATE_ACCOUNT | NAME | HAS_ROLE | PROPOSAL;

/// The account whose base permissions back every unset bit of every other
/// account.
pub fn global_permissions_address() -> Address { Address::zero() }

pub fn is_valid_perm_flag(flag: PermFlag) -> bool {
    flag != 0 && flag & !ALL_PERM_FLAGS == 0
}

/// A bit is known iff the matching `set_bit` is one; its value is then the
/// matching bit of `perms`. Unknown bits fall through to the global account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasePermissions {
    pub perms: PermFlag,
    pub set_bit: PermFlag,
}

impl BasePermissions {
    /// Value of `flag` if it is set here, `None` otherwise.
    pub fn get(&self, flag: PermFlag) -> Option<bool> {
        if self.set_bit & flag == flag {
            Some(self.perms & flag == flag)
        } else {
            None
        }
    }

    pub fn set(&mut self, flag: PermFlag, value: bool) {
        self.set_bit |= flag;
        if value {
            self.perms |= flag;
        } else {
            self.perms &= !flag;
        }
    }

    /// Forget the bit entirely; lookups fall through to the global account
    /// again.
    pub fn unset(&mut self, flag: PermFlag) {
        self.set_bit &= !flag;
        self.perms &= !flag;
    }

    /// Resolved view of these permissions over the global ones.
    pub fn compose(&self, global: &BasePermissions) -> PermFlag {
        (self.perms & self.set_bit)
            | (global.perms & global.set_bit & !self.set_bit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPermissions {
    pub base: BasePermissions,
    pub roles: Vec<String>,
}

impl AccountPermissions {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns whether the role was added; adding an existing role is a
    /// no-op, not an error.
    pub fn add_role(&mut self, role: &str) -> bool {
        if self.has_role(role) {
            return false;
        }
        self.roles.push(role.to_string());
        true
    }

    /// Returns whether the role was present.
    pub fn remove_role(&mut self, role: &str) -> bool {
        let len = self.roles.len();
        self.roles.retain(|r| r != role);
        self.roles.len() != len
    }
}

/// The effective permission mask of `address`: its own bits where set,
/// the global account's bits everywhere else.
pub fn effective_permissions(
    state: &dyn StateLayer, address: &Address,
) -> Result<PermFlag> {
    let base = state
        .get_account(address)?
        .map(|account| account.permissions.base)
        .unwrap_or_default();
    let global = state
        .get_account(&global_permissions_address())?
        .map(|account| account.permissions.base)
        .unwrap_or_default();
    Ok(base.compose(&global))
}

/// Whether `address` holds every bit of `flag`.
pub fn has_permission(
    state: &dyn StateLayer, address: &Address, flag: PermFlag,
) -> Result<bool> {
    Ok(effective_permissions(state, address)? & flag == flag)
}

pub fn ensure_permission(
    state: &dyn StateLayer, address: &Address, flag: PermFlag,
) -> Result<()> {
    if has_permission(state, address, flag)? {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            address: *address,
            perm: flag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut base = BasePermissions::default();
        assert_eq!(base.get(SEND), None);
        base.set(SEND, true);
        base.set(CALL, false);
        assert_eq!(base.get(SEND), Some(true));
        assert_eq!(base.get(CALL), Some(false));
        base.unset(SEND);
        assert_eq!(base.get(SEND), None);
    }

    #[test]
    fn compose_falls_through_unset_bits() {
        let mut global = BasePermissions::default();
        global.set(CALL, true);
        global.set(SEND, true);

        let mut base = BasePermissions::default();
        base.set(SEND, false);

        // SEND is pinned off locally; CALL falls through to the global on.
        let effective = base.compose(&global);
        assert_eq!(effective & SEND, 0);
        assert_eq!(effective & CALL, CALL);
    }

    #[test]
    fn roles_are_idempotent() {
        let mut permissions = AccountPermissions::default();
        assert!(permissions.add_role("admin"));
        assert!(!permissions.add_role("admin"));
        assert!(permissions.has_role("admin"));
        assert!(permissions.remove_role("admin"));
        assert!(!permissions.remove_role("admin"));
        assert!(!permissions.has_role("admin"));
    }

    #[test]
    fn flag_validity() {
        assert!(is_valid_perm_flag(SEND));
        assert!(is_valid_perm_flag(SET_GLOBAL | BOND));
        assert!(!is_valid_perm_flag(0));
        assert!(!is_valid_perm_flag(1 << 13));
    }
}
