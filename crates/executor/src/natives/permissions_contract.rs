// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The `Permissions` native contract: on-chain management of the account
//! permission bitflags and string roles.

use super::{
    abi::{AbiType, AbiValue},
    NativeContract, NativeFunction,
};
use crate::{call::CallScope, permissions, state::StateLayer};
use lazy_static::lazy_static;
use warren_types::{address_util::address_from_contract_name, Address, Word256};
use warren_vm_types::{CallParams, Error, Result};

lazy_static! {
    /// keccak("Permissions")[12..].
    pub static ref PERMISSIONS_CONTRACT_ADDRESS: Address =
        address_from_contract_name("Permissions");
}

pub fn permissions_contract() -> NativeContract {
    use AbiType::*;
    NativeContract::new(
        "Permissions",
        vec![
            NativeFunction::new(
                "addRole(address,string)",
                permissions::ADD_ROLE,
                vec![Address, String],
                add_role,
            ),
            NativeFunction::new(
                "removeRole(address,string)",
                permissions::REMOVE_ROLE,
                vec![Address, String],
                remove_role,
            ),
            NativeFunction::new(
                "hasRole(address,string)",
                permissions::HAS_ROLE,
                vec![Address, String],
                has_role,
            ),
            NativeFunction::new(
                "setBase(address,uint64,bool)",
                permissions::SET_BASE,
                vec![Address, Uint64, Bool],
                set_base,
            ),
            NativeFunction::new(
                "unsetBase(address,uint64)",
                permissions::UNSET_BASE,
                vec![Address, Uint64],
                unset_base,
            ),
            NativeFunction::new(
                "hasBase(address,uint64)",
                permissions::HAS_ROLE,
                vec![Address, Uint64],
                has_base,
            ),
            NativeFunction::new(
                "setGlobal(uint64,bool)",
                permissions::SET_GLOBAL,
                vec![Uint64, Bool],
                set_global,
            ),
        ],
    )
}

fn type_mismatch() -> Error {
    Error::Internal("native argument types diverge from the table".to_string())
}

fn check_flag(flag: u64) -> Result<()> {
    if permissions::is_valid_perm_flag(flag) {
        Ok(())
    } else {
        Err(Error::NativeFunction(format!(
            "invalid permission flag {:#x}",
            flag
        )))
    }
}

fn add_role(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, role) = match (&args[0], &args[1]) {
        (AbiValue::Address(account), AbiValue::String(role)) => {
            (*account, role.clone())
        }
        _ => return Err(type_mismatch()),
    };
    let mut added = false;
    scope.frame.update_account_with(&account, |account| {
        added = account.permissions.add_role(&role)
    })?;
    Ok(super::abi::bool_word(added))
}

fn remove_role(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, role) = match (&args[0], &args[1]) {
        (AbiValue::Address(account), AbiValue::String(role)) => {
            (*account, role.clone())
        }
        _ => return Err(type_mismatch()),
    };
    let mut removed = false;
    scope.frame.update_account_with(&account, |account| {
        removed = account.permissions.remove_role(&role)
    })?;
    Ok(super::abi::bool_word(removed))
}

fn has_role(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, role) = match (&args[0], &args[1]) {
        (AbiValue::Address(account), AbiValue::String(role)) => {
            (*account, role.clone())
        }
        _ => return Err(type_mismatch()),
    };
    let has = scope
        .frame
        .get_account(&account)?
        .map_or(false, |account| account.permissions.has_role(&role));
    Ok(super::abi::bool_word(has))
}

fn set_base(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, flag, value) = match (&args[0], &args[1], &args[2]) {
        (
            AbiValue::Address(account),
            AbiValue::Uint64(flag),
            AbiValue::Bool(value),
        ) => (*account, *flag, *value),
        _ => return Err(type_mismatch()),
    };
    check_flag(flag)?;
    scope.frame.update_account_with(&account, |account| {
        account.permissions.base.set(flag, value)
    })?;
    Ok(super::abi::uint64_word(flag))
}

fn unset_base(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, flag) = match (&args[0], &args[1]) {
        (AbiValue::Address(account), AbiValue::Uint64(flag)) => {
            (*account, *flag)
        }
        _ => return Err(type_mismatch()),
    };
    check_flag(flag)?;
    scope.frame.update_account_with(&account, |account| {
        account.permissions.base.unset(flag)
    })?;
    Ok(super::abi::uint64_word(flag))
}

fn has_base(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (account, flag) = match (&args[0], &args[1]) {
        (AbiValue::Address(account), AbiValue::Uint64(flag)) => {
            (*account, *flag)
        }
        _ => return Err(type_mismatch()),
    };
    check_flag(flag)?;
    let has = scope
        .frame
        .get_account(&account)?
        .map_or(false, |account| {
            account.permissions.base.get(flag) == Some(true)
        });
    Ok(super::abi::bool_word(has))
}

fn set_global(
    scope: &mut CallScope<'_, '_>, _params: &CallParams, args: Vec<AbiValue>,
) -> Result<Word256> {
    let (flag, value) = match (&args[0], &args[1]) {
        (AbiValue::Uint64(flag), AbiValue::Bool(value)) => (*flag, *value),
        _ => return Err(type_mismatch()),
    };
    check_flag(flag)?;
    let global = permissions::global_permissions_address();
    scope.frame.update_account_with(&global, |account| {
        account.permissions.base.set(flag, value)
    })?;
    Ok(super::abi::uint64_word(flag))
}
