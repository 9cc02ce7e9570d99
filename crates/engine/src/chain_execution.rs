// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The chain driver: pull canonical blocks from the store and feed them to
//! the block runner, advancing the head pointer only after each block's
//! state has been persisted.

use crate::{
    block_execution::RunBlockOpts,
    engine::Engine,
    error::{BlockError, EngineError, Result},
};
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};

#[derive(Default)]
pub struct RunBlockchainOpts {
    /// Stop after this many blocks.
    pub max_blocks: Option<u64>,
    /// Caller-supplied stop signal, observed between blocks only.
    pub stop: Option<Arc<AtomicBool>>,
}

pub struct RunBlockchainResult {
    /// Number of blocks applied before stopping.
    pub blocks_run: u64,
    /// The failure that stopped the run, if any, with the offending block
    /// number. Blocks before it are committed and canonical.
    pub failure: Option<(u64, EngineError)>,
}

impl Engine {
    /// Run stored blocks in canonical order starting right after the
    /// current head. Stops at the first missing block, on the stop signal,
    /// after `max_blocks`, or at the first invalid block.
    pub fn run_blockchain(
        &mut self, opts: RunBlockchainOpts,
    ) -> Result<RunBlockchainResult> {
        self.ensure_ready()?;
        self.set_busy()?;
        let result = self.run_blockchain_inner(opts);
        self.release_busy();
        result
    }

    fn run_blockchain_inner(
        &mut self, opts: RunBlockchainOpts,
    ) -> Result<RunBlockchainResult> {
        let mut blocks_run = 0u64;
        let mut failure = None;

        loop {
            if let Some(max) = opts.max_blocks {
                if blocks_run >= max {
                    break;
                }
            }
            if let Some(stop) = &opts.stop {
                if stop.load(Ordering::SeqCst) {
                    debug!("chain driver observed the stop signal");
                    break;
                }
            }

            let (head_number, head_hash) =
                match self.block_store.canonical_head() {
                    Some(head) => (head.block_header.number(), head.hash()),
                    None => break,
                };
            let next = match self.block_store.block_by_number(head_number + 1)
            {
                Some(block) => block,
                None => break,
            };
            // The driver applies a strictly linear chain.
            if *next.block_header.parent_hash() != head_hash {
                failure = Some((
                    head_number + 1,
                    BlockError::ParentHashMismatch {
                        expected: head_hash,
                        got: *next.block_header.parent_hash(),
                    }
                    .into(),
                ));
                break;
            }

            match self.run_block_inner(&next, RunBlockOpts::default()) {
                Ok(_) => {
                    // The state is persisted; only now may the canonical
                    // pointer move.
                    self.block_store.set_canonical_head(&next.hash());
                    blocks_run += 1;
                    debug!(
                        "chain driver advanced to block {}",
                        head_number + 1
                    );
                }
                Err(e) => {
                    warn!(
                        "chain driver stopped at block {}: {}",
                        head_number + 1,
                        e
                    );
                    failure = Some((head_number + 1, e));
                    break;
                }
            }
        }

        Ok(RunBlockchainResult {
            blocks_run,
            failure,
        })
    }
}
