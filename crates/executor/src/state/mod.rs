// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! A caching and checkpoint layer built upon the semantically meaningful
//! database interfaces, providing account, storage, warm-set and
//! transient-storage management to the execution engine.

mod checkpoints;
mod overlay_account;


pub use overlay_account::{AccountEntry, OverlayAccount};
#[cfg(test)]
pub use tests::get_state_for_genesis_write;

use checkpoints::CheckpointLayer;
use ethereum_types::{Address, H256, U256};
use keccak_hash::KECCAK_EMPTY;
use onyx_statedb::{Error as DbError, Result as DbResult, StateDb};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use primitives::bytes::Bytes;
use std::{
    collections::{
        hash_map::Entry::{Occupied, Vacant},
        HashMap, HashSet,
    },
    sync::Arc,
};

pub type AccountReadGuard<'a> = MappedRwLockReadGuard<'a, OverlayAccount>;
pub type AccountWriteGuard<'a> = MappedRwLockWriteGuard<'a, OverlayAccount>;

/// How account-touching write operations treat empty accounts.
pub enum CleanupMode<'a> {
    /// Create the target account even when nothing is transferred.
    ForceCreate,
    /// Do not create an account for a no-op write.
    NoEmpty,
    /// Track every touched address so empty ones can be swept after the
    /// transaction under the cleanup amendment.
    TrackTouched(&'a mut HashSet<Address>),
}

/// The ledger state as the execution engine sees it: a read-through account
/// cache with a checkpoint journal, per-transaction warm sets, transient
/// storage and the original-storage view.
pub struct State {
    db: StateDb,

    /// Cache of account entries.
    ///
    /// WARNING: don't remove cache entries outside of commit unless you
    /// know the checkpoint maintenance inside out.
    cache: RwLock<HashMap<Address, AccountEntry>>,

    /// The checkpoint journal.
    checkpoints: RwLock<Vec<CheckpointLayer>>,

    /// Addresses accessed by the running transaction.
    warm_accounts: HashSet<Address>,
    /// Storage slots accessed by the running transaction.
    warm_slots: HashSet<(Address, H256)>,
    /// Transaction-scoped scratchpad, discarded at the tx boundary.
    transient_storage: HashMap<(Address, H256), H256>,
    /// Slot values as of the start of the running transaction, captured
    /// before their first overwrite.
    original_storage: HashMap<(Address, H256), H256>,
}

impl State {
    pub fn new(db: StateDb) -> Self {
        State {
            db,
            cache: Default::default(),
            checkpoints: Default::default(),
            warm_accounts: Default::default(),
            warm_slots: Default::default(),
            transient_storage: Default::default(),
            original_storage: Default::default(),
        }
    }
}

/// Read-through cache internals.
impl State {
    fn fetch_account_mut<'a>(
        cache: &'a mut HashMap<Address, AccountEntry>, db: &StateDb,
        address: &Address, require_code: bool,
    ) -> DbResult<&'a mut AccountEntry> {
        let entry = match cache.entry(*address) {
            Occupied(e) => e.into_mut(),
            Vacant(e) => {
                let address = *e.key();
                e.insert(AccountEntry::new_loaded(
                    address,
                    db.get_account(&address)?,
                ))
            }
        };
        if require_code {
            if let Some(account) = entry.account_mut() {
                account.cache_code(db)?;
            }
        }
        Ok(entry)
    }

    /// An immutable reference to an account through the cache, `None` when
    /// the account does not exist.
    pub(crate) fn read_account_lock(
        &self, address: &Address,
    ) -> DbResult<Option<AccountReadGuard>> {
        self.read_account_ext_lock(address, false)
    }

    fn read_account_ext_lock(
        &self, address: &Address, require_code: bool,
    ) -> DbResult<Option<AccountReadGuard>> {
        let mut cache = self.cache.write();
        let entry =
            Self::fetch_account_mut(&mut cache, &self.db, address, require_code)?;
        Ok(if entry.account().is_some() {
            Some(RwLockReadGuard::map(
                RwLockWriteGuard::downgrade(cache),
                |cache| cache.get(address).unwrap().account().unwrap(),
            ))
        } else {
            None
        })
    }

    /// A mutable reference through the cache; fails when the account does
    /// not exist.
    fn write_account_lock(
        &self, address: &Address,
    ) -> DbResult<AccountWriteGuard> {
        self.write_account_inner(address, |address| {
            Err(DbError::IncompleteDatabase(*address))
        })
    }

    /// A mutable reference through the cache, initiating a basic account
    /// when none exists. It is legal to send value to a pre-computed
    /// contract address before the contract is deployed, so the stub is a
    /// plain balance carrier.
    fn write_account_or_new_lock(
        &self, address: &Address,
    ) -> DbResult<AccountWriteGuard> {
        self.write_account_inner(address, |address| {
            Ok(OverlayAccount::new_basic(*address, U256::zero()))
        })
    }

    /// Requests an account via the cache, records the pre-image into the
    /// topmost checkpoint, handles absence with `default`, and sets the
    /// dirty bit.
    fn write_account_inner<F>(
        &self, address: &Address, default: F,
    ) -> DbResult<AccountWriteGuard>
    where F: Fn(&Address) -> DbResult<OverlayAccount> {
        let mut cache = self.cache.write();
        let entry =
            Self::fetch_account_mut(&mut cache, &self.db, address, false)?;

        // Save the value before modification into the checkpoint.
        if let Some(layer) = self.checkpoints.write().last_mut() {
            layer.entry_or_insert(
                *address,
                checkpoints::CheckpointEntry::Recorded(entry.clone()),
            );
        }

        if let AccountEntry::Cached(_, dirty_bit) = entry {
            *dirty_bit = true;
        } else {
            *entry = AccountEntry::new_dirty(default(address)?);
        }

        Ok(RwLockWriteGuard::map(cache, |c| {
            c.get_mut(address)
                .expect("entry known to exist in the cache")
                .dirty_account_mut()
                .expect("required account must exist")
        }))
    }
}

/// Basic account fields.
impl State {
    pub fn exists(&self, address: &Address) -> DbResult<bool> {
        Ok(self.read_account_lock(address)?.is_some())
    }

    pub fn exists_and_not_null(&self, address: &Address) -> DbResult<bool> {
        Ok(self
            .read_account_lock(address)?
            .map_or(false, |acc| !acc.is_null()))
    }

    pub fn balance(&self, address: &Address) -> DbResult<U256> {
        Ok(self
            .read_account_lock(address)?
            .map_or(U256::zero(), |acc| *acc.balance()))
    }

    pub fn nonce(&self, address: &Address) -> DbResult<U256> {
        Ok(self
            .read_account_lock(address)?
            .map_or(U256::zero(), |acc| *acc.nonce()))
    }

    pub fn code_hash(&self, address: &Address) -> DbResult<H256> {
        Ok(self
            .read_account_lock(address)?
            .map_or(KECCAK_EMPTY, |acc| acc.code_hash()))
    }

    pub fn code(&self, address: &Address) -> DbResult<Option<Arc<Bytes>>> {
        Ok(self
            .read_account_ext_lock(address, true)?
            .and_then(|acc| acc.code()))
    }

    pub fn code_size(&self, address: &Address) -> DbResult<usize> {
        Ok(self
            .read_account_ext_lock(address, true)?
            .map_or(0, |acc| acc.code_size()))
    }

    pub fn is_contract_with_code(&self, address: &Address) -> DbResult<bool> {
        Ok(self
            .read_account_lock(address)?
            .map_or(false, |acc| acc.is_contract_with_code()))
    }

    pub fn inc_nonce(&mut self, address: &Address) -> DbResult<()> {
        self.write_account_or_new_lock(address)?.inc_nonce();
        Ok(())
    }

    pub fn set_nonce(
        &mut self, address: &Address, nonce: &U256,
    ) -> DbResult<()> {
        self.write_account_or_new_lock(address)?.set_nonce(nonce);
        Ok(())
    }

    pub fn add_balance(
        &mut self, address: &Address, by: &U256, cleanup_mode: CleanupMode,
    ) -> DbResult<()> {
        let exists = self.exists(address)?;
        // A zero-value credit neither creates the account (unless forced)
        // nor dirties an existing one, but touching an existing account
        // still registers for the cleanup sweep.
        if !by.is_zero()
            || (matches!(cleanup_mode, CleanupMode::ForceCreate) && !exists)
        {
            self.write_account_or_new_lock(address)?.add_balance(by);
        }
        if let CleanupMode::TrackTouched(set) = cleanup_mode {
            if exists {
                set.insert(*address);
            }
        }
        Ok(())
    }

    pub fn sub_balance(
        &mut self, address: &Address, by: &U256,
        cleanup_mode: &mut CleanupMode,
    ) -> DbResult<()> {
        if !by.is_zero() {
            self.write_account_lock(address)?.sub_balance(by);
        }
        if let CleanupMode::TrackTouched(set) = cleanup_mode {
            set.insert(*address);
        }
        Ok(())
    }

    pub fn transfer_balance(
        &mut self, from: &Address, to: &Address, by: &U256,
        mut cleanup_mode: CleanupMode,
    ) -> DbResult<()> {
        self.sub_balance(from, by, &mut cleanup_mode)?;
        self.add_balance(to, by, cleanup_mode)
    }

    /// Install a fresh contract account, shadowing whatever the address
    /// held before.
    pub fn new_contract(
        &mut self, address: &Address, balance: U256, nonce: U256,
    ) -> DbResult<()> {
        self.insert_to_cache(
            *address,
            AccountEntry::new_dirty(OverlayAccount::new_contract(
                *address, balance, nonce,
            )),
        );
        Ok(())
    }

    pub fn init_code(
        &mut self, address: &Address, code: Bytes,
    ) -> DbResult<()> {
        self.write_account_lock(address)?.init_code(code);
        Ok(())
    }

    /// Schedule the account for removal at commit.
    pub fn kill_account(&mut self, address: &Address) {
        self.insert_to_cache(*address, AccountEntry::Killed);
    }

    /// Sweep touched accounts left empty, per the cleanup amendment.
    pub fn kill_garbage(
        &mut self, touched: &HashSet<Address>,
    ) -> DbResult<()> {
        let mut garbage = Vec::new();
        for address in touched {
            if let Some(acc) = self.read_account_lock(address)? {
                if acc.is_null() {
                    garbage.push(*address);
                }
            }
        }
        for address in garbage {
            self.kill_account(&address);
        }
        Ok(())
    }
}

/// Storage access.
impl State {
    pub fn storage_at(
        &self, address: &Address, key: &H256,
    ) -> DbResult<H256> {
        match self.read_account_lock(address)? {
            Some(acc) => acc.storage_at(&self.db, key),
            None => Ok(H256::zero()),
        }
    }

    pub fn set_storage(
        &mut self, address: &Address, key: &H256, value: &H256,
    ) -> DbResult<()> {
        let slot = (*address, *key);
        if !self.original_storage.contains_key(&slot) {
            let original = self.storage_at(address, key)?;
            self.original_storage.insert(slot, original);
        }
        self.write_account_or_new_lock(address)?
            .set_storage(*key, *value);
        Ok(())
    }

    /// The slot value as of the start of the running transaction, required
    /// by the net-metered storage refund rules.
    pub fn original_storage_at(
        &self, address: &Address, key: &H256,
    ) -> DbResult<H256> {
        if let Some(value) = self.original_storage.get(&(*address, *key)) {
            return Ok(*value);
        }
        // Never written in this transaction, so the current value is the
        // original one.
        self.storage_at(address, key)
    }
}

/// Warm/accessed sets and transient storage, all scoped to the running
/// transaction and rolled back with checkpoints.
impl State {
    pub fn is_warm_account(&self, address: &Address) -> bool {
        self.warm_accounts.contains(address)
    }

    pub fn is_warm_storage_entry(
        &self, address: &Address, key: &H256,
    ) -> bool {
        self.warm_slots.contains(&(*address, *key))
    }

    pub fn warm_account(&mut self, address: Address) {
        if self.warm_accounts.insert(address) {
            if let Some(layer) = self.checkpoints.get_mut().last_mut() {
                layer.note_warm_account(address);
            }
        }
    }

    pub fn warm_storage_entry(&mut self, address: Address, key: H256) {
        if self.warm_slots.insert((address, key)) {
            if let Some(layer) = self.checkpoints.get_mut().last_mut() {
                layer.note_warm_slot(address, key);
            }
        }
    }

    pub fn transient_storage_at(&self, address: &Address, key: &H256) -> H256 {
        self.transient_storage
            .get(&(*address, *key))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_transient_storage(
        &mut self, address: Address, key: H256, value: H256,
    ) {
        let slot = (address, key);
        let old = self.transient_storage.get(&slot).copied().unwrap_or_default();
        if let Some(layer) = self.checkpoints.get_mut().last_mut() {
            layer.note_transient(address, key, old);
        }
        if value.is_zero() {
            self.transient_storage.remove(&slot);
        } else {
            self.transient_storage.insert(slot, value);
        }
    }

    /// Drop every per-transaction scratch structure. Called at the
    /// transaction boundary; checkpoints handle rollback within it.
    pub fn clear_tx_scope(&mut self) {
        self.warm_accounts.clear();
        self.warm_slots.clear();
        self.transient_storage.clear();
        self.original_storage.clear();
    }
}

/// Commit boundary.
impl State {
    /// Fold every dirty cache entry into the database's pending overlay and
    /// return the state root it implies. Non-destructive: the cache and any
    /// open checkpoints stay valid, so a failed validation can still revert.
    pub fn compute_state_root(&mut self) -> DbResult<H256> {
        let State { db, cache, .. } = self;
        for (address, entry) in cache.get_mut().iter() {
            match entry {
                AccountEntry::Killed => db.delete_account(address)?,
                AccountEntry::Cached(account, true) => {
                    account.write_to_db(db)?
                }
                _ => {}
            }
        }
        db.compute_state_root()
    }

    /// Persist the pending overlay and mark the cache clean. Must not run
    /// with open checkpoints.
    pub fn persist(&mut self) -> DbResult<H256> {
        if !self.checkpoints.get_mut().is_empty() {
            return Err(DbError::Msg(
                "persist with an open checkpoint".into(),
            ));
        }
        self.compute_state_root()?;
        let root = self.db.commit()?;
        let cache = self.cache.get_mut();
        cache.retain(|_, entry| !matches!(entry, AccountEntry::Killed));
        for entry in cache.values_mut() {
            if let AccountEntry::Cached(account, dirty) = entry {
                account.mark_committed();
                *dirty = false;
            }
        }
        Ok(root)
    }

    /// Throw away the pending overlay after a failed block.
    pub fn discard_pending(&mut self) { self.db.discard_pending(); }

    pub fn db_initialized(&self) -> bool { self.db.is_initialized() }

    /// The backing database, for engine-level cloning.
    pub fn db(&self) -> &StateDb { &self.db }
}

#[cfg(any(test, feature = "testonly_code"))]
impl State {
    pub fn into_db_for_test(self) -> StateDb { self.db }

    /// Drop the whole cache so the next reads go back to the database.
    pub fn revert_cache_for_test(&mut self) {
        assert!(self.checkpoints.get_mut().is_empty());
        self.cache.get_mut().clear();
    }
}
