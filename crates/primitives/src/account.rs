// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};
use ethereum_types::{H256, U256};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// The consensus record of an account as stored in the state.
#[derive(Clone, Debug, RlpDecodable, RlpEncodable, Eq, PartialEq)]
pub struct Account {
    pub nonce: U256,
    pub balance: U256,
    /// Commitment to the account's storage contents. Recomputed by the
    /// state layer every time the account is folded into the store; the
    /// null root for an account with no storage.
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Default for Account {
    fn default() -> Self { Account::new_empty() }
}

impl Account {
    pub fn new_empty() -> Account {
        Account {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }

    pub fn new_basic(balance: U256, nonce: U256) -> Account {
        Account {
            nonce,
            balance,
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }

    /// An account is empty when it has zero nonce, zero balance and no code.
    /// Empty accounts are removed from the state where the active rule set
    /// requires empty-account cleanup.
    pub fn is_empty(&self) -> bool {
        self.nonce.is_zero()
            && self.balance.is_zero()
            && self.code_hash == KECCAK_EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::keccak;

    #[test]
    fn empty_account_predicate() {
        let mut account = Account::new_empty();
        assert!(account.is_empty());

        account.balance = U256::one();
        assert!(!account.is_empty());

        let mut account = Account::new_empty();
        account.code_hash = keccak(&[0x60u8, 0x00]);
        assert!(!account.is_empty());
    }

    #[test]
    fn rlp_round_trip() {
        let account = Account::new_basic(U256::from(7_000_000u64), 3.into());
        let encoded = rlp::encode(&account);
        let decoded: Account = rlp::decode(&encoded).unwrap();
        assert_eq!(account, decoded);
    }
}
