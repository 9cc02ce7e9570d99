// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::executive_observer::ExecutiveObserver;

/// Transaction execution options.
pub struct TransactOptions<O: ExecutiveObserver> {
    pub observer: O,
    pub settings: TransactSettings,
}

impl Default for TransactOptions<()> {
    fn default() -> Self {
        Self {
            observer: (),
            settings: TransactSettings::all_checks(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransactSettings {
    /// Verify the signature against the cached sender.
    pub check_signature: bool,
    /// Require the sender nonce to equal the transaction nonce.
    pub check_nonce: bool,
    /// Enforce the fee-market bounds against the block base fee.
    pub check_base_price: bool,
    /// Enforce the block's remaining gas budget.
    pub check_block_gas_limit: bool,
    /// Deduct and settle the gas fee. Off for read-only calls.
    pub charge_gas: bool,
}

impl TransactSettings {
    pub fn all_checks() -> Self {
        Self {
            check_signature: true,
            check_nonce: true,
            check_base_price: true,
            check_block_gas_limit: true,
            charge_gas: true,
        }
    }

    /// For locally asserted senders (fake-signed transactions in tests and
    /// call simulation).
    pub fn unchecked_signature() -> Self {
        Self {
            check_signature: false,
            ..Self::all_checks()
        }
    }
}
