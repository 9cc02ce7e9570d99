// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The block runner: validate the header against the parent, execute the
//! transactions under a block-scope checkpoint, settle rewards, and verify
//! or generate the declared commitments.

use crate::{
    block_store::BlockStore,
    engine::Engine,
    error::{BlockError, EngineError, Result},
    events::EngineEvent,
};
use ethereum_types::{Address, Bloom, H256, U256};
use onyx_executor::{
    executive::{
        ExecutionOutcome, ExecutiveContext, TransactOptions, TransactSettings,
    },
    spec::CommonParams,
    state::CleanupMode,
};
use onyx_vm_types::{Env, Spec, BLOCKHASH_WINDOW};
use primitives::{Block, BlockHeader, Receipt};
use std::sync::Arc;

/// Denominator of the per-uncle depth penalty: an uncle at depth `d` earns
/// `reward * (8 - d) / 8`.
const UNCLE_DEPTH_DIVISOR: u64 = 8;
/// Divisor of the author's inclusion bonus per referenced uncle.
const UNCLE_INCLUSION_DIVISOR: u64 = 32;

#[derive(Debug, Clone, Copy)]
pub struct RunBlockOpts {
    /// Write the computed roots into the header instead of verifying them.
    pub generate: bool,
    /// Bypass the header-vs-parent validation.
    pub skip_header_validation: bool,
    /// Do not require sender nonces to match.
    pub skip_nonce: bool,
}

impl Default for RunBlockOpts {
    fn default() -> Self {
        RunBlockOpts {
            generate: false,
            skip_header_validation: false,
            skip_nonce: false,
        }
    }
}

pub struct RunBlockResult {
    pub receipts: Vec<Receipt>,
    pub state_root: H256,
    pub logs_bloom: Bloom,
    pub gas_used: U256,
    /// The executed block; under `generate` its header carries the
    /// computed roots.
    pub block: Block,
    /// Event handler failures. They never revert state.
    pub event_warnings: Vec<String>,
}

impl Engine {
    /// Run one block as a single state transition: either every effect is
    /// committed, or the state is exactly as before.
    pub fn run_block(
        &mut self, block: &Block, opts: RunBlockOpts,
    ) -> Result<RunBlockResult> {
        self.ensure_ready()?;
        self.set_busy()?;
        let result = self.run_block_inner(block, opts);
        self.release_busy();
        result
    }

    pub(crate) fn run_block_inner(
        &mut self, block: &Block, opts: RunBlockOpts,
    ) -> Result<RunBlockResult> {
        let header = &block.block_header;
        let spec = self.machine.spec(header.number(), self.hardfork_td);

        if !opts.skip_header_validation {
            let parent = self
                .block_store
                .block_by_hash(header.parent_hash())
                .ok_or(BlockError::UnknownParent(*header.parent_hash()))?;
            validate_header(
                header,
                &parent.block_header,
                self.machine.params(),
                &spec,
            )?;
            validate_uncles(block, self.machine.params())?;
            let transactions_root =
                Block::compute_transaction_root(&block.transactions);
            if !opts.generate && transactions_root != *header.transactions_root()
            {
                return Err(BlockError::TransactionsRootMismatch {
                    expected: *header.transactions_root(),
                    got: transactions_root,
                }
                .into());
            }
            let uncles_hash = Block::compute_uncles_hash(&block.uncles);
            if !opts.generate && uncles_hash != *header.uncles_hash() {
                return Err(BlockError::UnclesHashMismatch {
                    expected: *header.uncles_hash(),
                    got: uncles_hash,
                }
                .into());
            }
        }

        let mut event_warnings = Vec::new();
        self.events.notify(
            &EngineEvent::BeforeBlock { header },
            &mut event_warnings,
        );

        self.state.checkpoint();
        match self.apply_block(block, &spec, opts, &mut event_warnings) {
            Ok(result) => Ok(result),
            Err(e) => {
                // A partially-run block reverts atomically.
                let _ = self.state.revert_to_checkpoint();
                self.state.clear_tx_scope();
                self.state.discard_pending();
                Err(e)
            }
        }
    }

    fn apply_block(
        &mut self, block: &Block, spec: &Spec, opts: RunBlockOpts,
        event_warnings: &mut Vec<String>,
    ) -> Result<RunBlockResult> {
        let header = &block.block_header;
        let machine = Arc::clone(&self.machine);
        let mut env =
            env_for_block(header, machine.params(), &*self.block_store);

        debug!(
            "run block: number={} txs={}",
            header.number(),
            block.transactions.len()
        );

        let mut receipts = Vec::with_capacity(block.transactions.len());
        let mut logs_bloom = Bloom::default();
        for tx in &block.transactions {
            self.events
                .notify(&EngineEvent::BeforeTx { tx }, event_warnings);

            let settings = TransactSettings {
                check_nonce: !opts.skip_nonce,
                ..TransactSettings::all_checks()
            };
            let options = TransactOptions {
                observer: (),
                settings,
            };
            let outcome =
                ExecutiveContext::new(&mut self.state, &env, &machine, spec)
                    .transact(tx, options)?;

            let receipt = match outcome.make_receipt(env.accumulated_gas_used)
            {
                Some(receipt) => receipt,
                None => match outcome {
                    ExecutionOutcome::NotExecuted(e) => {
                        return Err(EngineError::Tx(e))
                    }
                    _ => unreachable!("receipt exists for executed outcomes"),
                },
            };
            env.accumulated_gas_used = receipt.gas_used;
            logs_bloom.accrue_bloom(&receipt.log_bloom);

            self.events.notify(
                &EngineEvent::AfterTx { receipt: &receipt },
                event_warnings,
            );
            receipts.push(receipt);
        }

        // End-of-block rewards, where the rule set still pays them.
        self.apply_end_of_block_rewards(
            header.number(),
            header.author(),
            &block.uncles,
            spec,
        )?;

        let gas_used = env.accumulated_gas_used;
        let receipts_root = Block::compute_receipts_root(&receipts);
        let transactions_root =
            Block::compute_transaction_root(&block.transactions);

        if !opts.generate {
            if gas_used != *header.gas_used() {
                return Err(BlockError::GasUsedMismatch {
                    expected: *header.gas_used(),
                    got: gas_used,
                }
                .into());
            }
            if receipts_root != *header.receipts_root() {
                return Err(BlockError::ReceiptsRootMismatch {
                    expected: *header.receipts_root(),
                    got: receipts_root,
                }
                .into());
            }
            if logs_bloom != *header.logs_bloom() {
                return Err(BlockError::LogsBloomMismatch.into());
            }
        }

        let state_root = self.state.compute_state_root()?;
        if !opts.generate && state_root != *header.state_root() {
            return Err(BlockError::StateRootMismatch {
                expected: *header.state_root(),
                got: state_root,
            }
            .into());
        }

        // The block holds; fold the block checkpoint and persist.
        self.state.discard_checkpoint()?;
        self.state.persist()?;

        let result_block = if opts.generate {
            let mut sealed = block.block_header.clone();
            sealed.set_state_root(state_root);
            sealed.set_transactions_root(transactions_root);
            sealed.set_receipts_root(receipts_root);
            sealed.set_uncles_hash(Block::compute_uncles_hash(&block.uncles));
            sealed.set_logs_bloom(logs_bloom);
            sealed.set_gas_used(gas_used);
            sealed.compute_hash();
            Block::new(
                sealed,
                block.transactions.clone(),
                block.uncles.clone(),
            )
        } else {
            block.clone()
        };

        self.events.notify(
            &EngineEvent::AfterBlock {
                header: &result_block.block_header,
                receipts: &receipts,
            },
            event_warnings,
        );

        Ok(RunBlockResult {
            receipts,
            state_root,
            logs_bloom,
            gas_used,
            block: result_block,
            event_warnings: std::mem::take(event_warnings),
        })
    }

    /// Miner and uncle rewards of the pre-merge rule sets: the author
    /// earns the base reward plus an inclusion bonus per referenced
    /// uncle, each uncle author a depth-discounted share of the base
    /// reward.
    pub(crate) fn apply_end_of_block_rewards(
        &mut self, number: u64, author: &Address, uncles: &[BlockHeader],
        spec: &Spec,
    ) -> Result<()> {
        if spec.eip4399 {
            return Ok(());
        }
        let reward = self.machine.params().block_reward(number);
        if reward.is_zero() {
            return Ok(());
        }

        let inclusion_bonus = reward / U256::from(UNCLE_INCLUSION_DIVISOR)
            * U256::from(uncles.len() as u64);
        self.state.add_balance(
            author,
            &(reward + inclusion_bonus),
            CleanupMode::NoEmpty,
        )?;

        for uncle in uncles {
            let depth = number.saturating_sub(uncle.number());
            // Depth was validated; the guard keeps the arithmetic total
            // for skip-validation runs.
            if depth == 0 || depth >= UNCLE_DEPTH_DIVISOR {
                continue;
            }
            let uncle_reward = reward
                * U256::from(UNCLE_DEPTH_DIVISOR - depth)
                / U256::from(UNCLE_DEPTH_DIVISOR);
            self.state.add_balance(
                uncle.author(),
                &uncle_reward,
                CleanupMode::NoEmpty,
            )?;
        }
        Ok(())
    }
}

/// Uncle sanity against the including block: the count cap and the depth
/// window. Verifying the uncle headers themselves is fork-choice work and
/// stays outside this engine.
pub(crate) fn validate_uncles(
    block: &Block, params: &CommonParams,
) -> Result<()> {
    let number = block.block_header.number();
    if block.uncles.len() > params.max_uncle_count {
        return Err(BlockError::TooManyUncles {
            max: params.max_uncle_count,
            got: block.uncles.len(),
        }
        .into());
    }
    for uncle in &block.uncles {
        let in_range = uncle.number() < number
            && number - uncle.number() <= params.uncle_depth_limit;
        if !in_range {
            return Err(BlockError::UncleOutOfRange {
                number: uncle.number(),
                block: number,
            }
            .into());
        }
    }
    Ok(())
}

/// Header invariants against the parent: linkage, monotonic timestamp, the
/// gas-limit adjustment band, and the base-fee derivation under the fee
/// market.
pub(crate) fn validate_header(
    header: &BlockHeader, parent: &BlockHeader, params: &CommonParams,
    spec: &Spec,
) -> Result<()> {
    if header.number() != parent.number() + 1 {
        return Err(BlockError::NumberMismatch {
            parent: parent.number(),
            got: header.number(),
        }
        .into());
    }
    if header.timestamp() <= parent.timestamp() {
        return Err(BlockError::TimestampNonMonotonic {
            parent: parent.timestamp(),
            got: header.timestamp(),
        }
        .into());
    }

    let parent_gas_limit = *parent.gas_limit();
    let delta = parent_gas_limit / params.gas_limit_bound_divisor;
    let gas_limit = *header.gas_limit();
    let out_of_band = gas_limit < params.min_gas_limit
        || gas_limit >= parent_gas_limit + delta
        || gas_limit + delta <= parent_gas_limit;
    if out_of_band {
        return Err(BlockError::GasLimitOutOfBand {
            parent: parent_gas_limit,
            got: gas_limit,
        }
        .into());
    }

    let expected_base_fee = if spec.eip1559 {
        Some(calc_base_fee(parent, params))
    } else {
        None
    };
    if header.base_fee() != expected_base_fee {
        return Err(BlockError::BaseFeeMismatch {
            expected: expected_base_fee,
            got: header.base_fee(),
        }
        .into());
    }

    Ok(())
}

/// The fee-market base fee of a block, derived from its parent's fullness.
pub(crate) fn calc_base_fee(
    parent: &BlockHeader, params: &CommonParams,
) -> U256 {
    let parent_base_fee = match parent.base_fee() {
        // First block under the fee market.
        None => return params.initial_base_fee,
        Some(base_fee) => base_fee,
    };
    let gas_target = *parent.gas_limit() / params.elasticity_multiplier;
    let gas_used = *parent.gas_used();
    let denominator = params.base_fee_max_change_denominator;

    if gas_used == gas_target || gas_target.is_zero() {
        parent_base_fee
    } else if gas_used > gas_target {
        let delta = parent_base_fee * (gas_used - gas_target)
            / gas_target
            / denominator;
        parent_base_fee + delta.max(U256::one())
    } else {
        let delta = parent_base_fee * (gas_target - gas_used)
            / gas_target
            / denominator;
        parent_base_fee.saturating_sub(delta)
    }
}

/// Hashes of the up to 256 most recent ancestors, parent first.
pub(crate) fn last_hashes(
    store: &dyn BlockStore, parent_hash: H256,
) -> Arc<Vec<H256>> {
    let mut hashes = Vec::new();
    let mut cursor = parent_hash;
    while (hashes.len() as u64) < BLOCKHASH_WINDOW {
        hashes.push(cursor);
        match store.block_by_hash(&cursor) {
            Some(block) if block.block_header.number() > 0 => {
                cursor = *block.block_header.parent_hash();
            }
            _ => break,
        }
    }
    Arc::new(hashes)
}

/// The execution environment of a block being run.
pub(crate) fn env_for_block(
    header: &BlockHeader, params: &CommonParams, store: &dyn BlockStore,
) -> Env {
    Env {
        number: header.number(),
        author: *header.author(),
        timestamp: header.timestamp(),
        difficulty: *header.difficulty(),
        gas_limit: *header.gas_limit(),
        base_fee: header.base_fee().unwrap_or_default(),
        prev_randao: *header.mix_hash(),
        chain_id: params.chain_id,
        last_hashes: last_hashes(store, *header.parent_hash()),
        accumulated_gas_used: U256::zero(),
    }
}

/// The environment of a hypothetical block right after `parent`; used for
/// standalone transactions and the block builder.
pub(crate) fn env_after_parent(
    parent: &BlockHeader, params: &CommonParams, store: &dyn BlockStore,
) -> Env {
    Env {
        number: parent.number() + 1,
        author: Default::default(),
        timestamp: parent.timestamp() + 1,
        difficulty: *parent.difficulty(),
        gas_limit: *parent.gas_limit(),
        base_fee: if parent.base_fee().is_some() {
            calc_base_fee(parent, params)
        } else {
            U256::zero()
        },
        prev_randao: *parent.mix_hash(),
        chain_id: params.chain_id,
        last_hashes: last_hashes(store, parent.hash()),
        accumulated_gas_used: U256::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::BlockHeaderBuilder;

    fn parent_header(gas_limit: u64, gas_used: u64, base_fee: Option<u64>) -> BlockHeader {
        BlockHeaderBuilder::new()
            .with_number(10)
            .with_timestamp(1000)
            .with_gas_limit(gas_limit.into())
            .with_gas_used(gas_used.into())
            .with_base_fee(base_fee.map(Into::into))
            .build()
    }

    #[test]
    fn base_fee_tracks_parent_fullness() {
        let params = CommonParams::default();

        // At target: unchanged.
        let parent = parent_header(30_000_000, 15_000_000, Some(1_000_000_000));
        assert_eq!(calc_base_fee(&parent, &params), U256::from(1_000_000_000));

        // Full block: +12.5%.
        let parent = parent_header(30_000_000, 30_000_000, Some(1_000_000_000));
        assert_eq!(calc_base_fee(&parent, &params), U256::from(1_125_000_000));

        // Empty block: -12.5%.
        let parent = parent_header(30_000_000, 0, Some(1_000_000_000));
        assert_eq!(calc_base_fee(&parent, &params), U256::from(875_000_000));

        // First fee-market block starts at the configured initial fee.
        let parent = parent_header(30_000_000, 0, None);
        assert_eq!(calc_base_fee(&parent, &params), params.initial_base_fee);
    }

    #[test]
    fn header_validation_catches_violations() {
        let params = CommonParams::default();
        let spec = params.spec(11, None);
        let parent = parent_header(30_000_000, 0, None);

        let good = BlockHeaderBuilder::new()
            .with_number(11)
            .with_timestamp(1001)
            .with_parent_hash(parent.hash())
            .with_gas_limit(30_000_000.into())
            .build();
        assert!(validate_header(&good, &parent, &params, &spec).is_ok());

        let bad_number = BlockHeaderBuilder::new()
            .with_number(13)
            .with_timestamp(1001)
            .with_gas_limit(30_000_000.into())
            .build();
        assert!(matches!(
            validate_header(&bad_number, &parent, &params, &spec),
            Err(EngineError::Block(BlockError::NumberMismatch { .. }))
        ));

        let stale_timestamp = BlockHeaderBuilder::new()
            .with_number(11)
            .with_timestamp(1000)
            .with_gas_limit(30_000_000.into())
            .build();
        assert!(matches!(
            validate_header(&stale_timestamp, &parent, &params, &spec),
            Err(EngineError::Block(BlockError::TimestampNonMonotonic { .. }))
        ));

        let band = 30_000_000 / 1024;
        let bad_gas_limit = BlockHeaderBuilder::new()
            .with_number(11)
            .with_timestamp(1001)
            .with_gas_limit((30_000_000 + band).into())
            .build();
        assert!(matches!(
            validate_header(&bad_gas_limit, &parent, &params, &spec),
            Err(EngineError::Block(BlockError::GasLimitOutOfBand { .. }))
        ));

        let unexpected_base_fee = BlockHeaderBuilder::new()
            .with_number(11)
            .with_timestamp(1001)
            .with_gas_limit(30_000_000.into())
            .with_base_fee(Some(1.into()))
            .build();
        assert!(matches!(
            validate_header(&unexpected_base_fee, &parent, &params, &spec),
            Err(EngineError::Block(BlockError::BaseFeeMismatch { .. }))
        ));
    }
}
