// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::Address;
use onyx_vm_types::MessageResult;
use primitives::LogEntry;
use std::collections::HashSet;

/// The consensus-relevant side effects accumulated while running one
/// transaction.
#[derive(Debug, Default)]
pub struct Substate {
    /// Accounts scheduled for destruction at the end of the transaction.
    pub suicides: HashSet<Address>,
    /// Accounts touched by value movement; candidates for empty-account
    /// cleanup under the relevant amendment.
    pub touched: HashSet<Address>,
    /// The transaction's refund counter. Signed because some amendments
    /// retract previously granted refunds.
    pub refund: i128,
    /// Created contracts, earliest creation first.
    pub contracts_created: Vec<Address>,
    /// Logs of successfully completed frames, in emission order.
    pub logs: Vec<LogEntry>,
}

impl Substate {
    pub fn new() -> Self { Substate::default() }

    /// Fold an interpreter report into this substate.
    pub fn accrue_message(&mut self, result: &MessageResult) {
        self.suicides.extend(result.selfdestructs.iter().copied());
        self.refund += result.refund_delta as i128;
        self.logs.extend(result.logs.iter().cloned());
        if let Some(address) = result.created_address {
            self.contracts_created.push(address);
        }
    }

    /// The refund counter clamped to non-negative, as creditable gas.
    pub fn creditable_refund(&self) -> u128 {
        if self.refund > 0 {
            self.refund as u128
        } else {
            0
        }
    }
}
