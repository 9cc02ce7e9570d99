// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::{Address, U256};
use primitives::{bytes::Bytes, LogEntry};

/// The settled result of one executed transaction, before receipt
/// assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    /// Gas charged to the sender, after the refund counter was applied.
    pub gas_used: U256,
    /// The full fee paid by the sender: `gas_used * effective gas price`.
    pub fee: U256,
    /// The base-fee portion of the fee, destroyed rather than paid to the
    /// author. Zero before the fee-market amendment.
    pub burnt_fee: U256,
    /// Logs of successfully completed frames.
    pub logs: Vec<LogEntry>,
    /// Created contracts, earliest creation first.
    pub contracts_created: Vec<Address>,
    /// Return data of the top-level message; the revert payload for a
    /// reverted transaction.
    pub output: Bytes,
}
