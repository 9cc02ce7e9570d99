// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The fixed-address builtin contracts. Their bodies are executed by the
//! interpreter collaborator; the engine needs their addresses and gas
//! pricing for access-list pre-warming, account priming and call pricing.

use ethereum_types::{Address, H256, U256};

/// Execution cost of a builtin as a function of input length.
pub trait Pricer: Send + Sync {
    fn cost(&self, input_len: usize) -> U256;
}

/// A linear pricing model: `base + word * ceil(len / 32)`.
pub struct Linear {
    base: u64,
    word: u64,
}

impl Linear {
    pub fn new(base: u64, word: u64) -> Linear { Linear { base, word } }
}

impl Pricer for Linear {
    fn cost(&self, input_len: usize) -> U256 {
        U256::from(self.base)
            + U256::from(self.word) * U256::from((input_len + 31) / 32)
    }
}

/// A builtin contract: pricing metadata plus the block number it activates
/// at.
pub struct Builtin {
    pricer: Box<dyn Pricer>,
    activate_at: u64,
}

impl Builtin {
    pub fn new(pricer: Box<dyn Pricer>, activate_at: u64) -> Builtin {
        Builtin {
            pricer,
            activate_at,
        }
    }

    pub fn cost(&self, input_len: usize) -> U256 {
        self.pricer.cost(input_len)
    }

    pub fn is_active(&self, block_number: u64) -> bool {
        block_number >= self.activate_at
    }
}

pub fn builtin_address(low: u64) -> Address {
    Address::from(H256::from_low_u64_be(low))
}
