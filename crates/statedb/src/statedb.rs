// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    error::Result,
    storage::{InMemoryStorage, StorageTrait},
    storage_key::{account_key, code_key, storage_key, storage_prefix},
};
use ethereum_types::{Address, H256};
use keccak_hash::{keccak, KECCAK_NULL_RLP};
use primitives::Account;

/// Typed accessors over the raw store. One `StateDb` is owned by exactly one
/// engine; its pending overlay is that engine's uncommitted block.
pub struct StateDb {
    storage: Box<dyn StorageTrait>,
}

impl StateDb {
    pub fn new(storage: Box<dyn StorageTrait>) -> Self { StateDb { storage } }

    pub fn new_in_memory() -> Self {
        StateDb {
            storage: Box::new(InMemoryStorage::new()),
        }
    }

    pub fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        let raw = match self.storage.get(&account_key(address))? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(Some(rlp::decode::<Account>(&raw)?))
    }

    pub fn set_account(
        &mut self, address: &Address, account: &Account,
    ) -> Result<()> {
        self.storage
            .set(account_key(address), rlp::encode(account).to_vec().into())
    }

    /// Remove the account record together with its code and every storage
    /// slot it owns.
    pub fn delete_account(&mut self, address: &Address) -> Result<()> {
        self.storage.delete(account_key(address))?;
        self.storage.delete(code_key(address))?;
        self.storage.delete_all(&storage_prefix(address))
    }

    pub fn get_code(&self, address: &Address) -> Result<Option<Box<[u8]>>> {
        self.storage.get(&code_key(address))
    }

    pub fn set_code(&mut self, address: &Address, code: &[u8]) -> Result<()> {
        self.storage.set(code_key(address), code.into())
    }

    /// Read a storage slot; unset slots read as zero.
    pub fn get_storage(&self, address: &Address, key: &H256) -> Result<H256> {
        match self.storage.get(&storage_key(address, key))? {
            Some(raw) if raw.len() == 32 => Ok(H256::from_slice(&raw)),
            Some(_) => Err("malformed storage slot value".into()),
            None => Ok(H256::zero()),
        }
    }

    /// Write a storage slot; writing zero deletes the slot so that it does
    /// not contribute to the root.
    pub fn set_storage(
        &mut self, address: &Address, key: &H256, value: &H256,
    ) -> Result<()> {
        let raw_key = storage_key(address, key);
        if value.is_zero() {
            self.storage.delete(raw_key)
        } else {
            self.storage.set(raw_key, value.as_bytes().into())
        }
    }

    /// Commitment to one account's storage contents, folded over the
    /// account's slot namespace in the merged view. Empty storage yields
    /// the canonical null root.
    pub fn compute_storage_root(&self, address: &Address) -> Result<H256> {
        let entries = self.storage.read_all(&storage_prefix(address))?;
        if entries.is_empty() {
            return Ok(KECCAK_NULL_RLP);
        }
        let mut root = H256::zero();
        let mut buffer = Vec::new();
        for (key, value) in entries {
            buffer.clear();
            buffer.extend_from_slice(root.as_bytes());
            buffer.extend_from_slice(&key);
            buffer.extend_from_slice(&value);
            root = keccak(&buffer);
        }
        Ok(root)
    }

    pub fn compute_state_root(&mut self) -> Result<H256> {
        self.storage.compute_state_root()
    }

    /// Persist the pending overlay.
    pub fn commit(&mut self) -> Result<H256> { self.storage.commit() }

    /// Drop the pending overlay.
    pub fn discard_pending(&mut self) { self.storage.discard_pending() }

    pub fn is_initialized(&self) -> bool { self.storage.is_initialized() }

    pub fn boxed_clone_storage(&self) -> Box<dyn StorageTrait> {
        self.storage.boxed_clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::U256;

    #[test]
    fn account_round_trip() {
        let mut db = StateDb::new_in_memory();
        let address = Address::repeat_byte(0x01);
        let account = Account::new_basic(U256::from(100), U256::from(2));
        db.set_account(&address, &account).unwrap();
        assert_eq!(db.get_account(&address).unwrap(), Some(account));
        assert_eq!(db.get_account(&Address::repeat_byte(0x02)).unwrap(), None);
    }

    #[test]
    fn zero_storage_write_is_deletion() {
        let mut db = StateDb::new_in_memory();
        let address = Address::repeat_byte(0x01);
        let key = H256::repeat_byte(0x10);

        db.set_storage(&address, &key, &H256::repeat_byte(0x01)).unwrap();
        let dirty_root = db.commit().unwrap();

        db.set_storage(&address, &key, &H256::zero()).unwrap();
        let cleared_root = db.commit().unwrap();

        assert_ne!(dirty_root, cleared_root);
        assert_eq!(db.get_storage(&address, &key).unwrap(), H256::zero());

        // Writing zero into an unset slot does not move the root.
        db.set_storage(&address, &H256::repeat_byte(0x22), &H256::zero())
            .unwrap();
        assert_eq!(db.commit().unwrap(), cleared_root);
    }

    #[test]
    fn storage_root_tracks_slot_contents() {
        let mut db = StateDb::new_in_memory();
        let address = Address::repeat_byte(0x01);
        let other = Address::repeat_byte(0x02);

        assert_eq!(db.compute_storage_root(&address).unwrap(), KECCAK_NULL_RLP);

        db.set_storage(&address, &H256::repeat_byte(0x10), &H256::repeat_byte(0x01))
            .unwrap();
        let root_one = db.compute_storage_root(&address).unwrap();
        assert_ne!(root_one, KECCAK_NULL_RLP);
        // Another account's slots do not contribute.
        assert_eq!(db.compute_storage_root(&other).unwrap(), KECCAK_NULL_RLP);

        db.set_storage(&address, &H256::repeat_byte(0x11), &H256::repeat_byte(0x02))
            .unwrap();
        let root_two = db.compute_storage_root(&address).unwrap();
        assert_ne!(root_one, root_two);

        // Clearing the second slot restores the one-slot commitment.
        db.set_storage(&address, &H256::repeat_byte(0x11), &H256::zero())
            .unwrap();
        assert_eq!(db.compute_storage_root(&address).unwrap(), root_one);
    }

    #[test]
    fn delete_account_sweeps_code_and_storage() {
        let mut db = StateDb::new_in_memory();
        let address = Address::repeat_byte(0x01);
        db.set_account(&address, &Account::new_basic(1.into(), 0.into()))
            .unwrap();
        db.set_code(&address, &[0x60, 0x00]).unwrap();
        db.set_storage(&address, &H256::repeat_byte(0x01), &H256::repeat_byte(0x02))
            .unwrap();
        db.commit().unwrap();

        db.delete_account(&address).unwrap();
        assert_eq!(db.get_account(&address).unwrap(), None);
        assert_eq!(db.get_code(&address).unwrap(), None);
        assert_eq!(
            db.get_storage(&address, &H256::repeat_byte(0x01)).unwrap(),
            H256::zero()
        );
    }
}
