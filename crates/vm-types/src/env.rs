// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::{Address, H256, U256};
use std::sync::Arc;

/// How many ancestor hashes the blockhash oracle serves. Queries outside
/// this window return zero.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Information concerning the block being executed, visible to every
/// transaction in it.
#[derive(Debug, Clone)]
pub struct Env {
    /// The block number.
    pub number: u64,
    /// The block author (coinbase).
    pub author: Address,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block difficulty (zero once the randomness beacon replaces it).
    pub difficulty: U256,
    /// The block gas limit.
    pub gas_limit: U256,
    /// The per-gas base fee, zero when the fee market is inactive.
    pub base_fee: U256,
    /// Randomness beacon of post-merge headers.
    pub prev_randao: H256,
    /// The chain id transactions must name under replay protection.
    pub chain_id: u64,
    /// Hashes of the up to [`BLOCKHASH_WINDOW`] most recent ancestors,
    /// most recent first (`last_hashes[0]` is the parent).
    pub last_hashes: Arc<Vec<H256>>,
    /// Gas accumulated by the transactions already executed in this block.
    pub accumulated_gas_used: U256,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            number: 0,
            author: Address::default(),
            timestamp: 0,
            difficulty: U256::zero(),
            gas_limit: U256::zero(),
            base_fee: U256::zero(),
            prev_randao: H256::zero(),
            chain_id: 0,
            last_hashes: Arc::new(vec![]),
            accumulated_gas_used: U256::zero(),
        }
    }
}

impl Env {
    /// Hash of the ancestor at `number`, or zero outside the window.
    pub fn blockhash(&self, number: &U256) -> H256 {
        if *number >= U256::from(self.number) {
            return H256::zero();
        }
        let number = number.as_u64();
        let distance = self.number - number;
        if distance > BLOCKHASH_WINDOW {
            return H256::zero();
        }
        self.last_hashes
            .get((distance - 1) as usize)
            .cloned()
            .unwrap_or_default()
    }
}
