// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{Address, H256, U256};
use keccak_hash::keccak;
use rlp::RlpStream;

/// Specifies how an address is calculated for a new contract.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum CreateContractAddressType {
    /// Address is calculated from sender and nonce. `CREATE` scheme.
    FromSenderNonce,
    /// Address is calculated from sender, salt and code hash. `CREATE2`
    /// scheme.
    FromSenderSaltAndCodeHash(H256),
}

/// Calculate a new contract address. Returns the address and the hash of the
/// init code.
pub fn cal_contract_address(
    address_scheme: CreateContractAddressType, sender: &Address, nonce: &U256,
    code: &[u8],
) -> (Address, H256) {
    let code_hash = keccak(code);
    let address = match address_scheme {
        CreateContractAddressType::FromSenderNonce => {
            let mut rlp = RlpStream::new_list(2);
            rlp.append(sender);
            rlp.append(nonce);
            Address::from(keccak(rlp.as_raw()))
        }
        CreateContractAddressType::FromSenderSaltAndCodeHash(salt) => {
            let mut buffer = [0u8; 1 + 20 + 32 + 32];
            buffer[0] = 0xff;
            buffer[1..(1 + 20)].copy_from_slice(&sender[..]);
            buffer[(1 + 20)..(1 + 20 + 32)].copy_from_slice(&salt[..]);
            buffer[(1 + 20 + 32)..].copy_from_slice(&code_hash[..]);
            Address::from(keccak(&buffer[..]))
        }
    };
    (address, code_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn create_address_from_sender_nonce() {
        // Well-known vector: sender 0f57..5ec6 with nonce 88.
        let sender =
            Address::from_str("0f572e5295c57f15886f9b263e2f6d2d6c7b5ec6")
                .unwrap();
        let expected =
            Address::from_str("3f09c73a5ed19289fb9bdc72f1742566df146f56")
                .unwrap();
        let (address, _) = cal_contract_address(
            CreateContractAddressType::FromSenderNonce,
            &sender,
            &U256::from(88),
            &[],
        );
        assert_eq!(address, expected);
    }

    #[test]
    fn create2_address_depends_on_salt() {
        let sender = Address::from([1u8; 20]);
        let (a, _) = cal_contract_address(
            CreateContractAddressType::FromSenderSaltAndCodeHash(H256::zero()),
            &sender,
            &U256::zero(),
            b"code",
        );
        let (b, _) = cal_contract_address(
            CreateContractAddressType::FromSenderSaltAndCodeHash(
                H256::from_low_u64_be(1),
            ),
            &sender,
            &U256::zero(),
            b"code",
        );
        assert_ne!(a, b);
    }
}
