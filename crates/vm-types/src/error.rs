// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use thiserror::Error;

/// Failures of the interpreter boundary itself. Ordinary execution failures
/// (revert, exceptional halt) are not errors: they are reported through
/// [`crate::MessageStatus`] so the transaction runner can build a failed
/// receipt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The environment facade failed against the backing database.
    #[error("state database error: {0}")]
    StateDb(String),
    /// The interpreter violated its own contract.
    #[error("interpreter internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
