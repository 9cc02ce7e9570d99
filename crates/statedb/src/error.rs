// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::Address;
use rlp::DecoderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("incomplete database: address={0:?}")]
    IncompleteDatabase(Address),

    /// A checkpoint was discarded or reverted with no checkpoint open. The
    /// journal is corrupt; callers must treat the engine as poisoned.
    #[error("checkpoint journal underflow")]
    JournalUnderflow,

    #[error("{0}")]
    Msg(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(e: String) -> Self { Error::Msg(e) }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self { Error::Msg(e.into()) }
}
