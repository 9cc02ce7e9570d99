// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::error::Result;
use ethereum_types::H256;
use keccak_hash::keccak;
use std::collections::BTreeMap;

/// The raw store under the state database.
///
/// Writes accumulate in a pending overlay on top of the committed map;
/// readers see the overlay. `commit` folds the overlay into the committed
/// map and `discard_pending` drops it; that pair is the transactional
/// boundary a block either passes or fails as a whole.
pub trait StorageTrait: Send + Sync {
    fn get(&self, access_key: &[u8]) -> Result<Option<Box<[u8]>>>;

    fn set(&mut self, access_key: Vec<u8>, value: Box<[u8]>) -> Result<()>;

    fn delete(&mut self, access_key: Vec<u8>) -> Result<()>;

    /// Delete every key under `access_key_prefix`.
    fn delete_all(&mut self, access_key_prefix: &[u8]) -> Result<()>;

    /// Read every key under `access_key_prefix` from the merged view, in
    /// key order.
    fn read_all(
        &self, access_key_prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Box<[u8]>)>>;

    /// Root of the store as it would be after committing the overlay.
    fn compute_state_root(&mut self) -> Result<H256>;

    /// Fold the pending overlay into the committed store.
    fn commit(&mut self) -> Result<H256>;

    /// Drop the pending overlay, reverting to the committed store.
    fn discard_pending(&mut self);

    /// Whether the committed store holds any data at all.
    fn is_initialized(&self) -> bool;

    fn boxed_clone(&self) -> Box<dyn StorageTrait>;
}

/// A `BTreeMap`-backed store. The default backend when the caller supplies
/// none, and the workhorse of the test suites.
#[derive(Default, Clone)]
pub struct InMemoryStorage {
    committed: BTreeMap<Vec<u8>, Box<[u8]>>,
    pending: BTreeMap<Vec<u8>, Option<Box<[u8]>>>,
    cached_state_root: Option<H256>,
}

impl InMemoryStorage {
    pub fn new() -> Self { Default::default() }

    /// Iterate the merged view in key order.
    fn for_each_merged(&self, mut f: impl FnMut(&[u8], &[u8])) {
        let mut pending = self.pending.iter().peekable();
        for (key, value) in &self.committed {
            // Emit pending keys ordered before this committed key.
            while pending.peek().map_or(false, |(pkey, _)| *pkey < key) {
                let (pkey, pvalue) = pending.next().unwrap();
                if let Some(pvalue) = pvalue {
                    f(pkey, pvalue);
                }
            }
            if pending.peek().map_or(false, |(pkey, _)| *pkey == key) {
                // The overlay masks this committed entry.
                let (_, pvalue) = pending.next().unwrap();
                if let Some(pvalue) = pvalue {
                    f(key, pvalue);
                }
            } else {
                f(key, value);
            }
        }
        for (pkey, pvalue) in pending {
            if let Some(pvalue) = pvalue {
                f(pkey, pvalue);
            }
        }
    }
}

impl StorageTrait for InMemoryStorage {
    fn get(&self, access_key: &[u8]) -> Result<Option<Box<[u8]>>> {
        if let Some(pending) = self.pending.get(access_key) {
            return Ok(pending.clone());
        }
        Ok(self.committed.get(access_key).cloned())
    }

    fn set(&mut self, access_key: Vec<u8>, value: Box<[u8]>) -> Result<()> {
        self.cached_state_root = None;
        self.pending.insert(access_key, Some(value));
        Ok(())
    }

    fn delete(&mut self, access_key: Vec<u8>) -> Result<()> {
        self.cached_state_root = None;
        self.pending.insert(access_key, None);
        Ok(())
    }

    fn delete_all(&mut self, access_key_prefix: &[u8]) -> Result<()> {
        self.cached_state_root = None;
        let doomed: Vec<Vec<u8>> = self
            .committed
            .range(access_key_prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(access_key_prefix))
            .map(|(k, _)| k.clone())
            .chain(
                self.pending
                    .range(access_key_prefix.to_vec()..)
                    .take_while(|(k, _)| k.starts_with(access_key_prefix))
                    .map(|(k, _)| k.clone()),
            )
            .collect();
        for key in doomed {
            self.pending.insert(key, None);
        }
        Ok(())
    }

    fn read_all(
        &self, access_key_prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Box<[u8]>)>> {
        let mut entries = Vec::new();
        self.for_each_merged(|key, value| {
            if key.starts_with(access_key_prefix) {
                entries.push((key.to_vec(), value.into()));
            }
        });
        Ok(entries)
    }

    fn compute_state_root(&mut self) -> Result<H256> {
        if let Some(root) = self.cached_state_root {
            return Ok(root);
        }
        let mut root = H256::zero();
        let mut buffer = Vec::new();
        self.for_each_merged(|key, value| {
            buffer.clear();
            buffer.extend_from_slice(root.as_bytes());
            buffer.extend_from_slice(key);
            buffer.extend_from_slice(value);
            root = keccak(&buffer);
        });
        self.cached_state_root = Some(root);
        Ok(root)
    }

    fn commit(&mut self) -> Result<H256> {
        let root = self.compute_state_root()?;
        let pending = std::mem::take(&mut self.pending);
        for (key, value) in pending {
            match value {
                Some(value) => {
                    self.committed.insert(key, value);
                }
                None => {
                    self.committed.remove(&key);
                }
            }
        }
        self.cached_state_root = Some(root);
        Ok(root)
    }

    fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.cached_state_root = None;
        }
    }

    fn is_initialized(&self) -> bool { !self.committed.is_empty() }

    fn boxed_clone(&self) -> Box<dyn StorageTrait> { Box::new(self.clone()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_overlay_masks_committed_values() {
        let mut storage = InMemoryStorage::new();
        storage.set(b"k1".to_vec(), b"v1".to_vec().into()).unwrap();
        storage.commit().unwrap();

        storage.set(b"k1".to_vec(), b"v2".to_vec().into()).unwrap();
        assert_eq!(
            storage.get(b"k1").unwrap(),
            Some(b"v2".to_vec().into_boxed_slice())
        );

        storage.discard_pending();
        assert_eq!(
            storage.get(b"k1").unwrap(),
            Some(b"v1".to_vec().into_boxed_slice())
        );
    }

    #[test]
    fn root_is_insensitive_to_overlay_vs_committed() {
        let mut direct = InMemoryStorage::new();
        direct.set(b"a".to_vec(), b"1".to_vec().into()).unwrap();
        direct.set(b"b".to_vec(), b"2".to_vec().into()).unwrap();
        let pending_root = direct.compute_state_root().unwrap();
        let committed_root = direct.commit().unwrap();
        assert_eq!(pending_root, committed_root);

        let mut staged = InMemoryStorage::new();
        staged.set(b"b".to_vec(), b"2".to_vec().into()).unwrap();
        staged.commit().unwrap();
        staged.set(b"a".to_vec(), b"1".to_vec().into()).unwrap();
        assert_eq!(staged.compute_state_root().unwrap(), committed_root);
    }

    #[test]
    fn delete_all_sweeps_both_layers() {
        let mut storage = InMemoryStorage::new();
        storage.set(b"s1a".to_vec(), b"x".to_vec().into()).unwrap();
        storage.commit().unwrap();
        storage.set(b"s1b".to_vec(), b"y".to_vec().into()).unwrap();
        storage.set(b"s2".to_vec(), b"z".to_vec().into()).unwrap();

        storage.delete_all(b"s1").unwrap();
        assert_eq!(storage.get(b"s1a").unwrap(), None);
        assert_eq!(storage.get(b"s1b").unwrap(), None);
        assert!(storage.get(b"s2").unwrap().is_some());
    }

    #[test]
    fn deletion_round_trip_restores_root() {
        let mut storage = InMemoryStorage::new();
        storage.set(b"k".to_vec(), b"v".to_vec().into()).unwrap();
        let base_root = storage.commit().unwrap();

        storage.set(b"other".to_vec(), b"w".to_vec().into()).unwrap();
        storage.commit().unwrap();
        storage.delete(b"other".to_vec()).unwrap();
        assert_eq!(storage.commit().unwrap(), base_root);
    }
}
