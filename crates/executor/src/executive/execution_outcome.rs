// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::executed::Executed;
use ethereum_types::{U256, U512};
use primitives::{
    Receipt, TRANSACTION_OUTCOME_FAILURE, TRANSACTION_OUTCOME_SUCCESS,
};
use thiserror::Error;

/// A transaction rejected before execution. No state was changed; the
/// transaction cannot be part of a valid block at this position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TxValidationError {
    #[error("transaction signature does not verify")]
    BadSignature,
    #[error("transaction chain id {got} does not match chain id {expected}")]
    WrongChainId { expected: u64, got: u64 },
    #[error("transaction type {tx_type} is not enabled by the active rule set")]
    UnsupportedTxType { tx_type: u8 },
    #[error("transaction gas {got} exceeds the block's remaining gas {remaining}")]
    BlockGasLimitExceeded { remaining: U256, got: U256 },
    #[error("transaction gas {got} is below the intrinsic requirement {required}")]
    IntrinsicGasTooLow { required: u64, got: U256 },
    #[error("init code of {got} bytes exceeds the limit of {limit}")]
    InitCodeExceedsLimit { limit: usize, got: usize },
    #[error("invalid nonce: expected {expected}, got {got}")]
    NonceMismatch { expected: U256, got: U256 },
    #[error("fee cap {fee_cap} is below the block base fee {base_fee}")]
    FeeCapBelowBaseFee { base_fee: U256, fee_cap: U256 },
    #[error("priority fee {priority_fee} exceeds the fee cap {fee_cap}")]
    PriorityFeeAboveFeeCap { fee_cap: U256, priority_fee: U256 },
    #[error("sender balance {balance} cannot cover cost {required}")]
    InsufficientFunds { required: U512, balance: U512 },
}

/// A failure reported by the interpreter. The transaction is included:
/// the sender's nonce advanced and the fee was paid, but the message's
/// effects were rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("transaction reverted")]
    Revert,
    #[error("transaction halted exceptionally")]
    ExceptionalHalt,
}

/// The outcome of submitting one transaction to the executive.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Rejected by a pre-execution check; the state is untouched.
    NotExecuted(TxValidationError),
    /// Included with a failed status; gas accounted, nonce advanced.
    ExecutionErrorBumpNonce(ExecutionError, Executed),
    /// Included and fully applied.
    Finished(Executed),
}

impl ExecutionOutcome {
    pub fn successfully_executed(&self) -> Option<&Executed> {
        match self {
            ExecutionOutcome::Finished(executed) => Some(executed),
            _ => None,
        }
    }

    /// The settlement payload of an included transaction, successful or
    /// not.
    pub fn executed(&self) -> Option<&Executed> {
        match self {
            ExecutionOutcome::Finished(executed)
            | ExecutionOutcome::ExecutionErrorBumpNonce(_, executed) => {
                Some(executed)
            }
            ExecutionOutcome::NotExecuted(_) => None,
        }
    }

    /// Assemble the receipt of an included transaction,
    /// `accumulated_gas_used` being the block's cumulative gas before this
    /// transaction.
    pub fn make_receipt(&self, accumulated_gas_used: U256) -> Option<Receipt> {
        let (outcome_status, executed) = match self {
            ExecutionOutcome::Finished(executed) => {
                (TRANSACTION_OUTCOME_SUCCESS, executed)
            }
            ExecutionOutcome::ExecutionErrorBumpNonce(_, executed) => {
                (TRANSACTION_OUTCOME_FAILURE, executed)
            }
            ExecutionOutcome::NotExecuted(_) => return None,
        };
        Some(Receipt::new(
            outcome_status,
            accumulated_gas_used + executed.gas_used,
            executed.logs.clone(),
            executed.output.clone(),
        ))
    }
}
