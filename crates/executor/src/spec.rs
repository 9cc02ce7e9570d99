// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::{Address, H256, U256};
use onyx_vm_types::Spec;
use primitives::{bytes::Bytes, BlockNumber};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// The ordered rule-set versions the engine understands. A version is a
/// named snapshot of the protocol parameters; the amendments it activates
/// are derived in [`CommonParams::spec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fork {
    Frontier,
    Homestead,
    SpuriousDragon,
    Byzantium,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
    /// Scheduled but not yet implemented by this engine; configuring it is
    /// rejected at construction.
    Prague,
}

/// The newest rule-set version this engine implements.
pub const LATEST_SUPPORTED_FORK: Fork = Fork::Cancun;

/// Activation record of one rule-set version. A version with a total
/// difficulty threshold activates once the chain's accumulated difficulty
/// reaches it, provided the block number also reached `block`; without a
/// threshold the block number alone decides.
#[derive(Debug, Clone)]
pub struct ForkTransition {
    pub fork: Fork,
    pub block: BlockNumber,
    pub total_difficulty: Option<U256>,
}

impl ForkTransition {
    pub fn at_block(fork: Fork, block: BlockNumber) -> Self {
        ForkTransition {
            fork,
            block,
            total_difficulty: None,
        }
    }

    pub fn at_total_difficulty(
        fork: Fork, block: BlockNumber, total_difficulty: U256,
    ) -> Self {
        ForkTransition {
            fork,
            block,
            total_difficulty: Some(total_difficulty),
        }
    }

    fn is_active(&self, number: BlockNumber, td: Option<U256>) -> bool {
        if number < self.block {
            return false;
        }
        match self.total_difficulty {
            None => true,
            Some(threshold) => td.map_or(false, |td| td >= threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// The configured transition table names a version outside the
    /// engine's declared support list.
    #[error("unsupported rule-set version: {0:?}")]
    UnsupportedRuleSet(Fork),
    /// An explicitly requested amendment number is unknown to this engine.
    #[error("unsupported amendment: {0}")]
    UnsupportedAmendment(u64),
    /// The caller asked for both by-block and by-total-difficulty rule-set
    /// selection at construction.
    #[error("conflicting hardfork selectors: by block number and by total difficulty")]
    ConflictingHardforkSelectors,
}

/// One account of the genesis allocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub balance: U256,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default, with = "serde_bytes_hex")]
    pub code: Bytes,
    #[serde(default)]
    pub storage: BTreeMap<H256, H256>,
}

mod serde_bytes_hex {
    use rustc_hex::{FromHex, ToHex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8], serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let hex: String = bytes.to_hex();
        serializer.serialize_str(&format!("0x{}", hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.strip_prefix("0x")
            .unwrap_or(&s)
            .from_hex()
            .map_err(serde::de::Error::custom)
    }
}

/// The genesis allocation materialized by the engine shell when asked to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisSpec {
    #[serde(default)]
    pub accounts: BTreeMap<Address, GenesisAccount>,
}

/// Chain-wide execution parameters: the transition table of rule-set
/// versions plus the constants that do not vary per version.
#[derive(Debug, Clone)]
pub struct CommonParams {
    /// Chain id transactions must name under replay protection.
    pub chain_id: u64,
    /// Minimum gas limit any header may carry.
    pub min_gas_limit: U256,
    /// Gas limit bound divisor (how much the gas limit can change per
    /// block).
    pub gas_limit_bound_divisor: U256,
    /// Fee-market gas target divisor: target gas is `gas_limit /
    /// elasticity_multiplier`.
    pub elasticity_multiplier: U256,
    /// Bounds the per-block change of the base fee.
    pub base_fee_max_change_denominator: U256,
    /// Base fee of the first fee-market block.
    pub initial_base_fee: U256,
    /// Block rewards by activation number. Ignored once the rule set stops
    /// paying miner rewards (post-merge).
    pub block_rewards: BTreeMap<BlockNumber, U256>,
    /// How many uncle headers a block may reference.
    pub max_uncle_count: usize,
    /// How far above its including block an uncle may sit.
    pub uncle_depth_limit: u64,
    /// The rule-set versions in activation order.
    pub transitions: Vec<ForkTransition>,
    /// Amendment numbers activated on top of the resolved version.
    pub extra_amendments: BTreeSet<u64>,
    /// The genesis allocation.
    pub genesis: GenesisSpec,
}

impl Default for CommonParams {
    fn default() -> Self {
        CommonParams {
            chain_id: 1,
            min_gas_limit: 5000.into(),
            gas_limit_bound_divisor: 1024.into(),
            elasticity_multiplier: 2.into(),
            base_fee_max_change_denominator: 8.into(),
            initial_base_fee: 1_000_000_000.into(),
            block_rewards: BTreeMap::from([(0, U256::from(2_000_000_000_000_000_000u64))]),
            max_uncle_count: 2,
            uncle_depth_limit: 6,
            transitions: vec![ForkTransition::at_block(Fork::Frontier, 0)],
            extra_amendments: BTreeSet::new(),
            genesis: GenesisSpec::default(),
        }
    }
}

impl CommonParams {
    /// The rule-set version in force at `number`. When both a by-number and
    /// a by-total-difficulty transition are satisfied, the later entry of
    /// the table wins, which puts plain block-number activation ahead of a
    /// difficulty threshold configured for an earlier version.
    pub fn fork_at(&self, number: BlockNumber, td: Option<U256>) -> Fork {
        let mut resolved = Fork::Frontier;
        for transition in &self.transitions {
            if transition.is_active(number, td) {
                resolved = transition.fork;
            }
        }
        resolved
    }

    /// The activation block of a version, when it is in the table.
    pub fn activation_block(&self, fork: Fork) -> Option<BlockNumber> {
        self.transitions
            .iter()
            .find(|t| t.fork == fork)
            .map(|t| t.block)
    }

    /// Derive the spec in force at `number`.
    pub fn spec(&self, number: BlockNumber, td: Option<U256>) -> Spec {
        let fork = self.fork_at(number, td);
        let mut spec = Spec::genesis_spec();
        spec.eip155 = fork >= Fork::SpuriousDragon;
        spec.eip158 = fork >= Fork::SpuriousDragon;
        spec.eip2028 = fork >= Fork::Istanbul;
        spec.eip2929 = fork >= Fork::Berlin;
        spec.eip2930 = fork >= Fork::Berlin;
        spec.eip1559 = fork >= Fork::London;
        spec.eip3529 = fork >= Fork::London;
        spec.eip3541 = fork >= Fork::London;
        spec.eip4399 = fork >= Fork::Paris;
        spec.eip3651 = fork >= Fork::Shanghai;
        spec.eip3860 = fork >= Fork::Shanghai;
        spec.eip1153 = fork >= Fork::Cancun;
        for amendment in &self.extra_amendments {
            Self::apply_amendment(&mut spec, *amendment);
        }
        spec.overwrite_gas_plan_by_amendments();
        spec
    }

    /// The amendment numbers this engine knows how to activate.
    pub fn supported_amendments() -> BTreeSet<u64> {
        BTreeSet::from([
            155, 158, 1153, 1559, 2028, 2929, 2930, 3529, 3540, 3541, 3651,
            3860, 4399,
        ])
    }

    fn apply_amendment(spec: &mut Spec, amendment: u64) {
        match amendment {
            155 => spec.eip155 = true,
            158 => spec.eip158 = true,
            1153 => spec.eip1153 = true,
            1559 => spec.eip1559 = true,
            2028 => spec.eip2028 = true,
            2929 => spec.eip2929 = true,
            2930 => spec.eip2930 = true,
            3529 => spec.eip3529 = true,
            3540 => spec.eip3540 = true,
            3541 => spec.eip3541 = true,
            3651 => spec.eip3651 = true,
            3860 => spec.eip3860 = true,
            4399 => spec.eip4399 = true,
            // Unknown numbers are rejected at engine construction.
            _ => {}
        }
    }

    /// Validate the transition table and the requested amendments against
    /// the engine's support lists.
    pub fn validate_support(&self) -> Result<(), SpecError> {
        for transition in &self.transitions {
            if transition.fork > LATEST_SUPPORTED_FORK {
                return Err(SpecError::UnsupportedRuleSet(transition.fork));
            }
        }
        let supported = Self::supported_amendments();
        for amendment in &self.extra_amendments {
            if !supported.contains(amendment) {
                return Err(SpecError::UnsupportedAmendment(*amendment));
            }
        }
        Ok(())
    }

    /// Return the miner reward for a block, zero when none is configured.
    pub fn block_reward(&self, number: BlockNumber) -> U256 {
        self.block_rewards
            .iter()
            .rev()
            .find(|&(block, _)| *block <= number)
            .map(|(_, reward)| *reward)
            .unwrap_or_default()
    }

    /// A schedule activating every rule-set version at block zero; the
    /// common case for fresh chains and tests.
    pub fn latest_at_genesis() -> Self {
        let forks = [
            Fork::Frontier,
            Fork::Homestead,
            Fork::SpuriousDragon,
            Fork::Byzantium,
            Fork::Istanbul,
            Fork::Berlin,
            Fork::London,
            Fork::Shanghai,
            Fork::Cancun,
        ];
        CommonParams {
            transitions: forks
                .iter()
                .map(|f| ForkTransition::at_block(*f, 0))
                .collect(),
            ..Default::default()
        }
    }

    #[cfg(any(test, feature = "testonly_code"))]
    pub fn spec_for_test(&self, number: u64) -> Spec { self.spec(number, None) }
}
