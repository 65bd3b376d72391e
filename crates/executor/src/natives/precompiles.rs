// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Crypto precompiles at the conventional low addresses, priced with a
//! linear base-plus-word model.

use crate::call::use_gas;
use parity_crypto::digest;
use std::collections::BTreeMap;
use warren_types::{Address, Bytes, H256};
use warren_vm_types::{CallParams, Result};

/// A linear pricing model: base cost plus a cost per 32-byte word of input.
pub struct Linear {
    base: u64,
    word: u64,
}

impl Linear {
    pub fn new(base: u64, word: u64) -> Linear { Linear { base, word } }

    pub fn cost(&self, input: &[u8]) -> u64 {
        self.base + self.word * (input.len() as u64).div_ceil(32)
    }
}

/// A raw-input built-in: no selector, the whole input is the argument.
pub struct Precompile {
    pub name: &'static str,
    pub address: Address,
    pricer: Linear,
    exec: fn(&[u8]) -> Result<Bytes>,
}

impl Precompile {
    pub fn execute(&self, params: &mut CallParams) -> Result<Bytes> {
        use_gas(&mut params.gas, self.pricer.cost(&params.input))?;
        (self.exec)(&params.input)
    }
}

/// The registered precompiles, keyed by address.
pub fn precompile_map() -> BTreeMap<Address, Precompile> {
    let mut map = BTreeMap::new();
    map.insert(
        Address::from(H256::from_low_u64_be(2)),
        Precompile {
            name: "sha256",
            address: Address::from(H256::from_low_u64_be(2)),
            pricer: Linear::new(60, 12),
            exec: sha256,
        },
    );
    map.insert(
        Address::from(H256::from_low_u64_be(3)),
        Precompile {
            name: "ripemd160",
            address: Address::from(H256::from_low_u64_be(3)),
            pricer: Linear::new(600, 120),
            exec: ripemd160,
        },
    );
    map.insert(
        Address::from(H256::from_low_u64_be(4)),
        Precompile {
            name: "identity",
            address: Address::from(H256::from_low_u64_be(4)),
            pricer: Linear::new(15, 3),
            exec: identity,
        },
    );
    map
}

fn sha256(input: &[u8]) -> Result<Bytes> {
    Ok(digest::sha256(input).to_vec())
}

fn ripemd160(input: &[u8]) -> Result<Bytes> {
    let hash = digest::ripemd160(input);
    let mut output = vec![0u8; 12];
    output.extend_from_slice(&*hash);
    Ok(output)
}

fn identity(input: &[u8]) -> Result<Bytes> { Ok(input.to_vec()) }
