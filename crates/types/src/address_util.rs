// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::Address;
use keccak_hash::keccak;

/// Derives the deterministic address of a built-in contract from its
/// registered name: the low 20 bytes of keccak-256 of the name.
pub fn address_from_contract_name(name: &str) -> Address {
    let hash = keccak(name.as_bytes());
    Address::from_slice(&hash[12..])
}
