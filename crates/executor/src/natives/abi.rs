// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The slice of the Ethereum ABI the native contracts speak: a 4-byte
//! selector followed by 32-byte left-padded words, with dynamic strings
//! encoded as offset, length and padded payload.

use keccak_hash::keccak;
use warren_types::{u64_to_word256, Address, Word256};
use warren_vm_types::{Error, Result};

/// First four bytes of keccak-256 of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint64,
    Bool,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint64(u64),
    Bool(bool),
    String(String),
}

fn abi_error(msg: impl Into<String>) -> Error {
    Error::NativeFunction(format!("abi: {}", msg.into()))
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8]> {
    let start = index * 32;
    data.get(start..start + 32)
        .ok_or_else(|| abi_error(format!("argument {} out of range", index)))
}

/// Decode the argument section (everything after the selector) against the
/// expected types.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>> {
    let mut values = Vec::with_capacity(types.len());
    for (index, ty) in types.iter().enumerate() {
        let word = word_at(data, index)?;
        let value = match ty {
            AbiType::Address => {
                AbiValue::Address(Address::from_slice(&word[12..]))
            }
            AbiType::Uint64 => {
                if word[..24].iter().any(|b| *b != 0) {
                    return Err(abi_error("uint64 out of range"));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&word[24..]);
                AbiValue::Uint64(u64::from_be_bytes(bytes))
            }
            AbiType::Bool => {
                if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
                    return Err(abi_error("malformed bool"));
                }
                AbiValue::Bool(word[31] == 1)
            }
            AbiType::String => {
                let offset = decode_usize(word)?;
                let length_word = data
                    .get(offset..offset + 32)
                    .ok_or_else(|| abi_error("string offset out of range"))?;
                let length = decode_usize(length_word)?;
                let bytes = data
                    .get(offset + 32..offset + 32 + length)
                    .ok_or_else(|| abi_error("string length out of range"))?;
                let string = String::from_utf8(bytes.to_vec())
                    .map_err(|_| abi_error("string is not utf-8"))?;
                AbiValue::String(string)
            }
        };
        values.push(value);
    }
    Ok(values)
}

fn decode_usize(word: &[u8]) -> Result<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(abi_error("offset out of range"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| abi_error("offset out of range"))
}

pub fn bool_word(value: bool) -> Word256 {
    u64_to_word256(value as u64)
}

pub fn uint64_word(value: u64) -> Word256 { u64_to_word256(value) }

/// Encode a call to `signature` with the given arguments. The inverse of
/// `decode`, used by callers and tests to build native-contract input.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let head_size = args.len() * 32;
    let mut out = selector(signature).to_vec();
    for arg in args {
        match arg {
            AbiValue::Address(address) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_bytes());
                head.extend_from_slice(&word);
            }
            AbiValue::Uint64(value) => {
                head.extend_from_slice(uint64_word(*value).as_bytes());
            }
            AbiValue::Bool(value) => {
                head.extend_from_slice(bool_word(*value).as_bytes());
            }
            AbiValue::String(string) => {
                let offset = head_size + tail.len();
                head.extend_from_slice(
                    uint64_word(offset as u64).as_bytes(),
                );
                tail.extend_from_slice(
                    uint64_word(string.len() as u64).as_bytes(),
                );
                tail.extend_from_slice(string.as_bytes());
                let padding = (32 - string.len() % 32) % 32;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_solidity() {
        assert_eq!(
            selector("setBase(address,uint64,bool)"),
            [0xdb, 0xd4, 0xa8, 0xea]
        );
        assert_eq!(
            selector("hasRole(address,string)"),
            [0x21, 0x7f, 0xe6, 0xc6]
        );
    }

    #[test]
    fn static_arguments_round_trip() {
        let address = Address::from_low_u64_be(0x0202);
        let input = encode_call(
            "setBase(address,uint64,bool)",
            &[
                AbiValue::Address(address),
                AbiValue::Uint64(16),
                AbiValue::Bool(true),
            ],
        );
        assert_eq!(&input[..4], &selector("setBase(address,uint64,bool)"));
        let values = decode(
            &[AbiType::Address, AbiType::Uint64, AbiType::Bool],
            &input[4..],
        )
        .unwrap();
        assert_eq!(
            values,
            vec![
                AbiValue::Address(address),
                AbiValue::Uint64(16),
                AbiValue::Bool(true),
            ]
        );
    }

    #[test]
    fn string_argument_round_trips() {
        let input = encode_call(
            "addRole(address,string)",
            &[
                AbiValue::Address(Address::from_low_u64_be(9)),
                AbiValue::String("validator".to_string()),
            ],
        );
        let values =
            decode(&[AbiType::Address, AbiType::String], &input[4..]).unwrap();
        assert_eq!(values[1], AbiValue::String("validator".to_string()));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(decode(&[AbiType::Uint64], &[0u8; 16]).is_err());
        // Bool with garbage in the high bytes.
        let mut word = [0u8; 32];
        word[0] = 1;
        word[31] = 1;
        assert!(decode(&[AbiType::Bool], &word).is_err());
    }
}
