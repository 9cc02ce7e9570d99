// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::{Address, U256};
use primitives::{bytes::Bytes, LogEntry};
use std::collections::HashSet;

/// How a message finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// The message ran to completion; its effects stand.
    Success,
    /// The message reverted; the interpreter has rolled back its own inner
    /// checkpoints and preserved the return data.
    Revert,
    /// The message halted exceptionally; all gas is consumed and the caller
    /// reverts the frame.
    ExceptionalHalt,
}

/// The interpreter's report for one executed message tree.
#[derive(Debug, Clone)]
pub struct MessageResult {
    pub status: MessageStatus,
    /// Gas remaining after execution. Zero on an exceptional halt.
    pub gas_left: U256,
    /// Return data; the revert payload when `status` is `Revert`, the
    /// deployed code for a successful create.
    pub return_data: Bytes,
    /// Logs emitted by frames that completed successfully.
    pub logs: Vec<LogEntry>,
    /// Accounts scheduled for destruction at the end of the transaction.
    pub selfdestructs: HashSet<Address>,
    /// Signed change to the transaction's refund counter.
    pub refund_delta: i64,
    /// The address of the created contract, for a successful create.
    pub created_address: Option<Address>,
}

impl MessageResult {
    /// A successful result with no side effects beyond gas consumption.
    pub fn success(gas_left: U256) -> Self {
        MessageResult {
            status: MessageStatus::Success,
            gas_left,
            return_data: vec![],
            logs: vec![],
            selfdestructs: HashSet::new(),
            refund_delta: 0,
            created_address: None,
        }
    }

    /// A revert carrying the given payload and the unconsumed gas.
    pub fn reverted(gas_left: U256, return_data: Bytes) -> Self {
        MessageResult {
            status: MessageStatus::Revert,
            gas_left,
            return_data,
            logs: vec![],
            selfdestructs: HashSet::new(),
            refund_delta: 0,
            created_address: None,
        }
    }

    /// An exceptional halt: every remaining unit of gas is consumed.
    pub fn exceptional_halt() -> Self {
        MessageResult {
            status: MessageStatus::ExceptionalHalt,
            gas_left: U256::zero(),
            return_data: vec![],
            logs: vec![],
            selfdestructs: HashSet::new(),
            refund_delta: 0,
            created_address: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MessageStatus::Success
    }
}
