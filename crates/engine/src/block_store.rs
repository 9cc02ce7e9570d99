// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use ethereum_types::H256;
use primitives::{Block, BlockNumber};
use std::{collections::HashMap, sync::Arc};

/// The durable block store consumed by the chain driver and the blockhash
/// oracle. Blocks are indexed by hash and by number; the canonical head
/// pointer only moves via `set_canonical_head`, which is what keeps the
/// driver crash-consistent.
pub trait BlockStore: Send + Sync {
    fn block_by_hash(&self, hash: &H256) -> Option<Arc<Block>>;

    fn block_by_number(&self, number: BlockNumber) -> Option<Arc<Block>>;

    /// Store a block and index it by number. The head pointer does not
    /// move.
    fn put_block(&mut self, block: Block);

    fn canonical_head(&self) -> Option<Arc<Block>>;

    /// Advance the head pointer to a stored block. Returns false when the
    /// hash is unknown.
    fn set_canonical_head(&mut self, hash: &H256) -> bool;

    fn boxed_clone(&self) -> Box<dyn BlockStore>;
}

/// The in-memory store used when the caller supplies none.
#[derive(Default, Clone)]
pub struct InMemoryBlockStore {
    blocks: HashMap<H256, Arc<Block>>,
    by_number: HashMap<BlockNumber, H256>,
    head: Option<H256>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self { Default::default() }
}

impl BlockStore for InMemoryBlockStore {
    fn block_by_hash(&self, hash: &H256) -> Option<Arc<Block>> {
        self.blocks.get(hash).cloned()
    }

    fn block_by_number(&self, number: BlockNumber) -> Option<Arc<Block>> {
        self.by_number
            .get(&number)
            .and_then(|hash| self.blocks.get(hash))
            .cloned()
    }

    fn put_block(&mut self, block: Block) {
        let hash = block.hash();
        self.by_number.insert(block.block_header.number(), hash);
        self.blocks.insert(hash, Arc::new(block));
    }

    fn canonical_head(&self) -> Option<Arc<Block>> {
        self.head.and_then(|hash| self.blocks.get(&hash)).cloned()
    }

    fn set_canonical_head(&mut self, hash: &H256) -> bool {
        if self.blocks.contains_key(hash) {
            self.head = Some(*hash);
            true
        } else {
            false
        }
    }

    fn boxed_clone(&self) -> Box<dyn BlockStore> { Box::new(self.clone()) }
}
