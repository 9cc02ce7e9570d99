// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

pub use keccak_hash as hash;

pub mod account;
pub mod block;
pub mod block_header;
pub mod bytes;
pub mod crypto;
pub mod log_entry;
pub mod receipt;
pub mod transaction;

pub use crate::{
    account::Account,
    block::{Block, BlockNumber},
    block_header::{BlockHeader, BlockHeaderBuilder},
    log_entry::LogEntry,
    receipt::{
        Receipt, TRANSACTION_OUTCOME_FAILURE, TRANSACTION_OUTCOME_SUCCESS,
    },
    transaction::{
        AccessList, AccessListItem, Action, SignedTransaction, Transaction,
        TransactionError, TransactionWithSignature,
    },
};
