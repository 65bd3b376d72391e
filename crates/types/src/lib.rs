// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

pub use ethereum_types::{BigEndianHash, H160, H256, U256, U512};

/// 20-byte account identifier. Equality is bytewise.
pub type Address = H160;

/// 32-byte big-endian value; the VM stack element and storage key/value type.
pub type Word256 = H256;

/// Raw byte vector.
pub type Bytes = Vec<u8>;

pub mod address_util;
pub mod contract_address;

pub use contract_address::{cal_contract_address, CreateContractAddressType};

/// Left-pads a `u64` into a big-endian 32-byte word.
pub fn u64_to_word256(value: u64) -> Word256 {
    H256::from_uint(&U256::from(value))
}

/// Reads the low 64 bits of a big-endian 32-byte word. The high 24 bytes are
/// ignored.
pub fn word256_to_u64(word: &Word256) -> u64 {
    word.into_uint().low_u64()
}

/// The low 20 bytes (12..32) of a word, as an address.
pub fn word256_to_address(word: &Word256) -> Address {
    Address::from_slice(&word[12..])
}

/// Left-pads a 20-byte address into a 32-byte word.
pub fn address_to_word256(address: &Address) -> Word256 {
    let mut word = Word256::zero();
    word.0[12..].copy_from_slice(address.as_bytes());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_word_round_trip() {
        for n in [0u64, 1, 255, 256, 50_000, u64::MAX - 1, u64::MAX] {
            assert_eq!(word256_to_u64(&u64_to_word256(n)), n);
        }
    }

    #[test]
    fn u64_word_is_left_padded() {
        let word = u64_to_word256(1);
        assert_eq!(word.0[..31], [0u8; 31]);
        assert_eq!(word.0[31], 1);
    }

    #[test]
    fn address_word_round_trip() {
        let address = Address::from([0xab; 20]);
        let word = address_to_word256(&address);
        assert_eq!(word.0[..12], [0u8; 12]);
        assert_eq!(word256_to_address(&word), address);
    }
}
