// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::{H256, U256};
use onyx_executor::{
    executive::TxValidationError, spec::SpecError,
};
use thiserror::Error;

/// A block that fails validation against its parent or its own declared
/// commitments. The enclosing run reverts as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    #[error("parent block {0:?} is not known")]
    UnknownParent(H256),
    #[error("parent hash {got:?} does not link to the canonical head {expected:?}")]
    ParentHashMismatch { expected: H256, got: H256 },
    #[error("block number {got} does not follow parent {parent}")]
    NumberMismatch { parent: u64, got: u64 },
    #[error("timestamp {got} is not after parent timestamp {parent}")]
    TimestampNonMonotonic { parent: u64, got: u64 },
    #[error("gas limit {got} is outside the adjustment band of {parent}")]
    GasLimitOutOfBand { parent: U256, got: U256 },
    #[error("base fee mismatch: expected {expected:?}, got {got:?}")]
    BaseFeeMismatch {
        expected: Option<U256>,
        got: Option<U256>,
    },
    #[error("transactions root mismatch: expected {expected:?}, got {got:?}")]
    TransactionsRootMismatch { expected: H256, got: H256 },
    #[error("uncles hash mismatch: expected {expected:?}, got {got:?}")]
    UnclesHashMismatch { expected: H256, got: H256 },
    #[error("block references {got} uncles, more than the {max} allowed")]
    TooManyUncles { max: usize, got: usize },
    #[error("uncle at number {number} is out of range for block {block}")]
    UncleOutOfRange { number: u64, block: u64 },
    #[error("receipts root mismatch: expected {expected:?}, got {got:?}")]
    ReceiptsRootMismatch { expected: H256, got: H256 },
    #[error("gas used mismatch: expected {expected}, got {got}")]
    GasUsedMismatch { expected: U256, got: U256 },
    #[error("logs bloom mismatch")]
    LogsBloomMismatch,
    #[error("state root mismatch: expected {expected:?}, got {got:?}")]
    StateRootMismatch { expected: H256, got: H256 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rule-set configuration failures at construction.
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// The caller passed an option key this engine no longer accepts.
    #[error("legacy option rejected: {0}")]
    LegacyOptionRejected(String),
    /// An execution method ran before `init`.
    #[error("engine is not initialized")]
    NotInitialized,
    /// A mutating call overlapped another, or a previous run was torn
    /// down abnormally. The engine must be treated as poisoned.
    #[error("engine is busy with another mutating operation")]
    EngineBusy,
    /// A terminal call was already made on the block builder.
    #[error("block builder is already sealed or reverted")]
    BuilderClosed,
    /// The transaction does not fit the block under construction.
    #[error("transaction gas would overflow the block gas limit")]
    TxGasLimitBlockOverflow,
    #[error(transparent)]
    Block(#[from] BlockError),
    /// A transaction was rejected by the pre-execution checks.
    #[error("invalid transaction: {0}")]
    Tx(#[from] TxValidationError),
    #[error(transparent)]
    Database(#[from] onyx_statedb::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
