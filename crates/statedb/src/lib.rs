// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! A caching-friendly, transactional view over the raw account store. Writes
//! land in a pending overlay; the block runner either commits the overlay or
//! discards it wholesale, which is what makes a failed block atomic.

mod error;
mod statedb;
mod storage;
mod storage_key;

pub use self::{
    error::{Error, Result},
    statedb::StateDb,
    storage::{InMemoryStorage, StorageTrait},
};
