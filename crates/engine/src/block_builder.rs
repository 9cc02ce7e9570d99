// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The block builder: the inverse of the block runner. Transactions are
//! applied one at a time against a long-lived checkpoint; `build` settles
//! and seals, `revert` discards everything.

use crate::{
    block_execution::{env_after_parent, validate_uncles},
    engine::Engine,
    error::{BlockError, EngineError, Result},
    events::EngineEvent,
};
use ethereum_types::{Address, Bloom, H256, U256};
use onyx_executor::executive::{
    ExecutionOutcome, ExecutiveContext, TransactOptions, TransactSettings,
};
use primitives::{
    Block, BlockHeader, BlockHeaderBuilder, Receipt, SignedTransaction,
};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct BuildBlockOpts {
    /// The author (coinbase) of the block under construction.
    pub author: Address,
    /// Block timestamp; defaults to parent timestamp + 1.
    pub timestamp: Option<u64>,
    /// Gas limit; defaults to the parent's.
    pub gas_limit: Option<U256>,
    /// Randomness beacon for post-merge headers.
    pub mix_hash: Option<H256>,
    /// Uncle headers to reference, where the rule set still has uncles.
    pub uncles: Vec<BlockHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderStatus {
    Open,
    Sealed,
    Reverted,
}

/// A block under construction. Exactly one terminal call, [`build`] or
/// [`revert`], is required; afterwards the builder is closed.
///
/// [`build`]: BlockBuilder::build
/// [`revert`]: BlockBuilder::revert
pub struct BlockBuilder<'a> {
    engine: &'a mut Engine,
    env: onyx_vm_types::Env,
    spec: onyx_vm_types::Spec,
    parent_hash: H256,
    base_fee: Option<U256>,
    transactions: Vec<Arc<SignedTransaction>>,
    uncles: Vec<BlockHeader>,
    receipts: Vec<Receipt>,
    logs_bloom: Bloom,
    status: BuilderStatus,
    event_warnings: Vec<String>,
}

impl Engine {
    /// Open a builder on top of the canonical head. The engine stays busy
    /// until the builder's terminal call.
    pub fn build_block(
        &mut self, opts: BuildBlockOpts,
    ) -> Result<BlockBuilder<'_>> {
        self.ensure_ready()?;
        self.set_busy()?;

        let head = match self.block_store.canonical_head() {
            Some(head) => head,
            None => {
                self.release_busy();
                return Err(BlockError::UnknownParent(H256::zero()).into());
            }
        };
        let parent = &head.block_header;
        let params = self.machine.params();

        let mut env = env_after_parent(parent, params, &*self.block_store);
        env.author = opts.author;
        if let Some(timestamp) = opts.timestamp {
            env.timestamp = timestamp;
        }
        if let Some(gas_limit) = opts.gas_limit {
            env.gas_limit = gas_limit;
        }
        if let Some(mix_hash) = opts.mix_hash {
            env.prev_randao = mix_hash;
        }

        let spec = self.machine.spec(env.number, self.hardfork_td);
        let base_fee = spec.eip1559.then(|| env.base_fee);
        let parent_hash = parent.hash();

        // Reject a doomed uncle set before any work is checkpointed.
        {
            let probe = Block::new(
                BlockHeaderBuilder::new().with_number(env.number).build(),
                vec![],
                opts.uncles.clone(),
            );
            if let Err(e) = validate_uncles(&probe, self.machine.params()) {
                self.release_busy();
                return Err(e);
            }
        }

        self.state.checkpoint();
        Ok(BlockBuilder {
            engine: self,
            env,
            spec,
            parent_hash,
            base_fee,
            transactions: Vec::new(),
            uncles: opts.uncles,
            receipts: Vec::new(),
            logs_bloom: Bloom::default(),
            status: BuilderStatus::Open,
            event_warnings: Vec::new(),
        })
    }
}

impl<'a> BlockBuilder<'a> {
    /// Gas accumulated by the transactions applied so far.
    pub fn gas_used(&self) -> U256 { self.env.accumulated_gas_used }

    pub fn transaction_count(&self) -> usize { self.transactions.len() }

    /// Apply one transaction on top of the builder checkpoint and append
    /// its receipt.
    pub fn add_transaction(
        &mut self, tx: Arc<SignedTransaction>,
    ) -> Result<Receipt> {
        self.ensure_open()?;
        let remaining =
            self.env.gas_limit - self.env.accumulated_gas_used;
        if *tx.gas() > remaining {
            return Err(EngineError::TxGasLimitBlockOverflow);
        }

        let engine = &mut *self.engine;
        engine
            .events
            .notify(&EngineEvent::BeforeTx { tx: &tx }, &mut self.event_warnings);

        let machine = Arc::clone(&engine.machine);
        let options = TransactOptions {
            observer: (),
            settings: TransactSettings::all_checks(),
        };
        let outcome = ExecutiveContext::new(
            &mut engine.state,
            &self.env,
            &machine,
            &self.spec,
        )
        .transact(&tx, options)?;

        let receipt = match outcome.make_receipt(self.env.accumulated_gas_used)
        {
            Some(receipt) => receipt,
            None => match outcome {
                ExecutionOutcome::NotExecuted(e) => {
                    // The transaction was rejected; the builder state is
                    // untouched and stays open.
                    return Err(EngineError::Tx(e));
                }
                _ => unreachable!("receipt exists for executed outcomes"),
            },
        };
        self.env.accumulated_gas_used = receipt.gas_used;
        self.logs_bloom.accrue_bloom(&receipt.log_bloom);

        engine.events.notify(
            &EngineEvent::AfterTx { receipt: &receipt },
            &mut self.event_warnings,
        );

        self.transactions.push(tx);
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }

    /// Settle end-of-block processing, compute the commitments, commit the
    /// long-lived checkpoint and seal the block.
    pub fn build(&mut self) -> Result<Block> {
        self.ensure_open()?;
        self.engine.apply_end_of_block_rewards(
            self.env.number,
            &self.env.author,
            &self.uncles,
            &self.spec,
        )?;

        let engine = &mut *self.engine;
        engine.state.discard_checkpoint()?;
        let state_root = engine.state.compute_state_root()?;
        engine.state.persist()?;

        let header = BlockHeaderBuilder::new()
            .with_parent_hash(self.parent_hash)
            .with_number(self.env.number)
            .with_author(self.env.author)
            .with_timestamp(self.env.timestamp)
            .with_gas_limit(self.env.gas_limit)
            .with_gas_used(self.env.accumulated_gas_used)
            .with_state_root(state_root)
            .with_transactions_root(Block::compute_transaction_root(
                &self.transactions,
            ))
            .with_receipts_root(Block::compute_receipts_root(&self.receipts))
            .with_uncles_hash(Block::compute_uncles_hash(&self.uncles))
            .with_logs_bloom(self.logs_bloom)
            .with_mix_hash(self.env.prev_randao)
            .with_base_fee(self.base_fee)
            .with_difficulty(self.env.difficulty)
            .build();
        let block = Block::new(
            header,
            std::mem::take(&mut self.transactions),
            std::mem::take(&mut self.uncles),
        );

        engine.events.notify(
            &EngineEvent::AfterBlock {
                header: &block.block_header,
                receipts: &self.receipts,
            },
            &mut self.event_warnings,
        );

        self.status = BuilderStatus::Sealed;
        engine.release_busy();
        Ok(block)
    }

    /// Discard the long-lived checkpoint and every applied transaction.
    pub fn revert(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.engine.state.revert_to_checkpoint()?;
        self.engine.state.clear_tx_scope();
        self.status = BuilderStatus::Reverted;
        self.engine.release_busy();
        Ok(())
    }

    /// Receipts of the applied transactions, in order.
    pub fn receipts(&self) -> &[Receipt] { &self.receipts }

    /// Event handler failures observed so far.
    pub fn event_warnings(&self) -> &[String] { &self.event_warnings }

    fn ensure_open(&self) -> Result<()> {
        if self.status == BuilderStatus::Open {
            Ok(())
        } else {
            Err(EngineError::BuilderClosed)
        }
    }
}

impl Drop for BlockBuilder<'_> {
    fn drop(&mut self) {
        if self.status == BuilderStatus::Open {
            warn!("block builder dropped without build() or revert(); discarding");
            let _ = self.engine.state.revert_to_checkpoint();
            self.engine.state.clear_tx_scope();
            self.engine.release_busy();
        }
    }
}
