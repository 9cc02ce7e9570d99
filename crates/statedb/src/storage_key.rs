// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Key-space layout of the raw store. Every account owns three namespaces:
//! its basic record, its code, and a prefix under which all of its storage
//! slots live (so deleting the account is one prefix sweep).

use ethereum_types::{Address, H256};

const ACCOUNT_PREFIX: u8 = b'a';
const CODE_PREFIX: u8 = b'c';
const STORAGE_PREFIX: u8 = b's';

pub fn account_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 20);
    key.push(ACCOUNT_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn code_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 20);
    key.push(CODE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn storage_prefix(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 20);
    key.push(STORAGE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn storage_key(address: &Address, slot: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 20 + 32);
    key.push(STORAGE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(slot.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_share_the_account_prefix() {
        let address = Address::repeat_byte(0x42);
        let slot = H256::repeat_byte(0x01);
        assert!(storage_key(&address, &slot)
            .starts_with(&storage_prefix(&address)));
        assert_ne!(account_key(&address), code_key(&address));
    }
}
