// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Checkpoints: the diff records backing the journal, and the maintenance
//! logic for opening, committing and reverting them.

use super::{overlay_account::AccountEntry, State};
use ethereum_types::{Address, H256};
use onyx_statedb::{Error as DbError, Result as DbResult};
use std::collections::{HashMap, HashSet};

/// An account entry in the checkpoint.
#[derive(Clone)]
pub(super) enum CheckpointEntry {
    /// The account has not been read or modified from the database when
    /// the checkpoint was opened.
    Unchanged,
    /// The recorded image of the account at the checkpoint.
    Recorded(AccountEntry),
}
use CheckpointEntry::*;

impl CheckpointEntry {
    fn from_cache(value: Option<AccountEntry>) -> Self {
        match value {
            Some(v) => Recorded(v),
            None => Unchanged,
        }
    }
}

/// One recoverable layer of the journal. Account entries are added lazily:
/// the pre-image is captured the first time an account is written after the
/// layer opened. The warm-set and transient-storage journals follow the
/// same discipline.
#[derive(Default)]
pub(super) struct CheckpointLayer {
    /// Pre-images of account entries modified since this layer opened.
    entries: HashMap<Address, CheckpointEntry>,
    /// Addresses first marked warm in this layer.
    warm_accounts: HashSet<Address>,
    /// Storage slots first marked warm in this layer.
    warm_slots: HashSet<(Address, H256)>,
    /// Pre-images of transient-storage writes (zero means the slot was
    /// unset).
    transient: HashMap<(Address, H256), H256>,
}

impl CheckpointLayer {
    pub fn entry_or_insert(
        &mut self, address: Address, entry: CheckpointEntry,
    ) {
        self.entries.entry(address).or_insert(entry);
    }

    pub fn note_warm_account(&mut self, address: Address) {
        self.warm_accounts.insert(address);
    }

    pub fn note_warm_slot(&mut self, address: Address, key: H256) {
        self.warm_slots.insert((address, key));
    }

    pub fn note_transient(
        &mut self, address: Address, key: H256, old: H256,
    ) {
        self.transient.entry((address, key)).or_insert(old);
    }
}

impl State {
    /// Create a recoverable checkpoint of this state and return its index.
    /// The checkpoint records every pre-image that is alive at creation
    /// time and overwritten before the next checkpoint.
    pub fn checkpoint(&mut self) -> usize {
        let checkpoints = self.checkpoints.get_mut();
        checkpoints.push(CheckpointLayer::default());
        checkpoints.len() - 1
    }

    /// Merge the last checkpoint with the previous one.
    pub fn discard_checkpoint(&mut self) -> DbResult<()> {
        let checkpoints = self.checkpoints.get_mut();
        let layer = checkpoints.pop().ok_or(DbError::JournalUnderflow)?;
        if let Some(parent) = checkpoints.last_mut() {
            // The parent keeps its own, earlier pre-images; only keys the
            // parent never saw are transferred.
            for (address, entry) in layer.entries {
                parent.entries.entry(address).or_insert(entry);
            }
            parent.warm_accounts.extend(layer.warm_accounts);
            parent.warm_slots.extend(layer.warm_slots);
            for (key, old) in layer.transient {
                parent.transient.entry(key).or_insert(old);
            }
        }
        Ok(())
    }

    /// Revert to the last checkpoint and discard it.
    pub fn revert_to_checkpoint(&mut self) -> DbResult<()> {
        let layer = self
            .checkpoints
            .get_mut()
            .pop()
            .ok_or(DbError::JournalUnderflow)?;
        let cache = self.cache.get_mut();
        for (address, entry) in layer.entries {
            match entry {
                Recorded(entry) => {
                    cache.insert(address, entry);
                }
                Unchanged => {
                    // Never in the cache before this layer; drop it so the
                    // next read goes back to the database.
                    cache.remove(&address);
                }
            }
        }
        for address in layer.warm_accounts {
            self.warm_accounts.remove(&address);
        }
        for slot in layer.warm_slots {
            self.warm_slots.remove(&slot);
        }
        for (slot, old) in layer.transient {
            if old.is_zero() {
                self.transient_storage.remove(&slot);
            } else {
                self.transient_storage.insert(slot, old);
            }
        }
        Ok(())
    }

    /// Number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize { self.checkpoints.read().len() }

    /// Insert a new account entry into the cache, incorporating the old
    /// version into the topmost checkpoint as needed.
    pub(super) fn insert_to_cache(
        &mut self, address: Address, entry: AccountEntry,
    ) {
        let old_entry = self.cache.get_mut().insert(address, entry);
        if let Some(layer) = self.checkpoints.get_mut().last_mut() {
            layer.entry_or_insert(address, CheckpointEntry::from_cache(old_entry));
        }
    }
}
