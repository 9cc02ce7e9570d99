// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The in-memory image of one account while a block executes, plus the
//! cache entry wrapper the state keeps per address.

use ethereum_types::{Address, H256, U256};
use keccak_hash::{keccak, KECCAK_EMPTY};
use onyx_statedb::{Result as DbResult, StateDb};
use primitives::{bytes::Bytes, Account};
use std::{collections::HashMap, sync::Arc};

/// A dirty-trackable overlay of one account. Storage writes collect in the
/// write cache until the state folds them into the database overlay;
/// everything else is plain fields.
#[derive(Clone, Debug)]
pub struct OverlayAccount {
    address: Address,
    balance: U256,
    nonce: U256,
    code_hash: H256,
    code: Option<Arc<Bytes>>,
    code_dirty: bool,
    storage_write_cache: HashMap<H256, H256>,
    /// A newly created contract ignores any storage the database still
    /// holds under its address; commit clears that storage first.
    is_newly_created: bool,
}

impl OverlayAccount {
    /// An account loaded from its database record. Code is loaded lazily.
    pub fn from_loaded(address: Address, account: Account) -> Self {
        OverlayAccount {
            address,
            balance: account.balance,
            nonce: account.nonce,
            code_hash: account.code_hash,
            code: None,
            code_dirty: false,
            storage_write_cache: HashMap::new(),
            is_newly_created: false,
        }
    }

    /// A basic account stub, used when value reaches an address with no
    /// record yet.
    pub fn new_basic(address: Address, balance: U256) -> Self {
        OverlayAccount {
            address,
            balance,
            nonce: U256::zero(),
            code_hash: KECCAK_EMPTY,
            code: None,
            code_dirty: false,
            storage_write_cache: HashMap::new(),
            is_newly_created: false,
        }
    }

    /// A contract account being created by this transaction.
    pub fn new_contract(address: Address, balance: U256, nonce: U256) -> Self {
        OverlayAccount {
            address,
            balance,
            nonce,
            code_hash: KECCAK_EMPTY,
            code: None,
            code_dirty: false,
            storage_write_cache: HashMap::new(),
            is_newly_created: true,
        }
    }

    pub fn address(&self) -> &Address { &self.address }

    pub fn balance(&self) -> &U256 { &self.balance }

    pub fn nonce(&self) -> &U256 { &self.nonce }

    pub fn code_hash(&self) -> H256 { self.code_hash }

    /// Empty per the cleanup amendment: no nonce, no balance, no code.
    pub fn is_null(&self) -> bool {
        self.balance.is_zero()
            && self.nonce.is_zero()
            && self.code_hash == KECCAK_EMPTY
    }

    pub fn is_contract_with_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }

    pub fn add_balance(&mut self, by: &U256) {
        self.balance = self.balance.saturating_add(*by);
    }

    /// The caller must have checked the balance covers `by`.
    pub fn sub_balance(&mut self, by: &U256) {
        assert!(self.balance >= *by);
        self.balance -= *by;
    }

    pub fn set_nonce(&mut self, nonce: &U256) { self.nonce = *nonce; }

    pub fn inc_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(U256::one());
    }

    /// Install freshly deployed code.
    pub fn init_code(&mut self, code: Bytes) {
        self.code_hash = keccak(&code);
        self.code = Some(Arc::new(code));
        self.code_dirty = true;
    }

    /// Load the account code from the database unless already cached.
    pub fn cache_code(&mut self, db: &StateDb) -> DbResult<()> {
        if self.code_hash == KECCAK_EMPTY || self.code.is_some() {
            return Ok(());
        }
        match db.get_code(&self.address)? {
            Some(code) => {
                self.code = Some(Arc::new(code.into_vec()));
                Ok(())
            }
            None => {
                Err(onyx_statedb::Error::IncompleteDatabase(self.address))
            }
        }
    }

    /// The cached code; `None` for a codeless account. `cache_code` must
    /// have run for contract accounts.
    pub fn code(&self) -> Option<Arc<Bytes>> { self.code.clone() }

    pub fn code_size(&self) -> usize {
        self.code.as_ref().map_or(0, |c| c.len())
    }

    /// Current slot value as seen by this overlay.
    pub fn storage_at(&self, db: &StateDb, key: &H256) -> DbResult<H256> {
        if let Some(value) = self.storage_write_cache.get(key) {
            return Ok(*value);
        }
        if self.is_newly_created {
            return Ok(H256::zero());
        }
        db.get_storage(&self.address, key)
    }

    pub fn set_storage(&mut self, key: H256, value: H256) {
        self.storage_write_cache.insert(key, value);
    }

    /// Fold this overlay into the database's pending layer. The account
    /// record is written last so its storage root covers the slot writes
    /// above it.
    pub fn write_to_db(&self, db: &mut StateDb) -> DbResult<()> {
        if self.is_newly_created {
            db.delete_account(&self.address)?;
        }
        for (key, value) in &self.storage_write_cache {
            db.set_storage(&self.address, key, value)?;
        }
        if self.code_dirty {
            if let Some(code) = &self.code {
                db.set_code(&self.address, code)?;
            }
        }
        let mut account = self.as_account();
        account.storage_root = db.compute_storage_root(&self.address)?;
        db.set_account(&self.address, &account)
    }

    /// Forget dirty tracking after the database committed this overlay.
    pub fn mark_committed(&mut self) {
        self.storage_write_cache.clear();
        self.code_dirty = false;
        self.is_newly_created = false;
    }

    /// The bare record of this overlay; `write_to_db` fills in the storage
    /// root once the slot writes are folded.
    pub fn as_account(&self) -> Account {
        let mut account = Account::new_basic(self.balance, self.nonce);
        account.code_hash = self.code_hash;
        account
    }
}

/// An account entry in the state cache.
#[derive(Clone, Debug)]
pub enum AccountEntry {
    /// The account is known to be absent from the database.
    DbAbsent,
    /// The account was destroyed during execution; commit removes its
    /// record, code and storage.
    Killed,
    /// A cached account with its dirty bit.
    Cached(OverlayAccount, bool),
}

impl AccountEntry {
    pub fn new_loaded(
        address: Address, account: Option<Account>,
    ) -> AccountEntry {
        match account {
            Some(account) => AccountEntry::Cached(
                OverlayAccount::from_loaded(address, account),
                false,
            ),
            None => AccountEntry::DbAbsent,
        }
    }

    pub fn new_dirty(account: OverlayAccount) -> AccountEntry {
        AccountEntry::Cached(account, true)
    }

    pub fn account(&self) -> Option<&OverlayAccount> {
        match self {
            AccountEntry::Cached(account, _) => Some(account),
            _ => None,
        }
    }

    pub fn account_mut(&mut self) -> Option<&mut OverlayAccount> {
        match self {
            AccountEntry::Cached(account, _) => Some(account),
            _ => None,
        }
    }

    pub fn dirty_account_mut(&mut self) -> Option<&mut OverlayAccount> {
        match self {
            AccountEntry::Cached(account, true) => Some(account),
            _ => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, AccountEntry::Killed | AccountEntry::Cached(_, true))
    }
}
