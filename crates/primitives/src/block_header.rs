// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    bytes::Bytes,
    hash::{keccak, KECCAK_EMPTY_LIST_RLP, KECCAK_NULL_RLP},
};
use ethereum_types::{Address, Bloom, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// A block header.
///
/// The optional base fee distinguishes headers of the fee-market rule set;
/// it participates in the RLP exactly when present.
#[derive(Clone, Debug, Eq)]
pub struct BlockHeader {
    /// Parent hash.
    parent_hash: H256,
    /// Block author (the coinbase of the rewards and fees).
    author: Address,
    /// State root after this block's execution.
    state_root: H256,
    /// Transactions root.
    transactions_root: H256,
    /// Block receipts root.
    receipts_root: H256,
    /// Commitment to the block's uncle headers.
    uncles_hash: H256,
    /// Block logs bloom.
    logs_bloom: Bloom,
    /// Block difficulty.
    difficulty: U256,
    /// Block number.
    number: u64,
    /// Gas limit.
    gas_limit: U256,
    /// Gas used by all transactions in the block.
    gas_used: U256,
    /// Block timestamp.
    timestamp: u64,
    /// Randomness beacon carried by post-merge headers.
    mix_hash: H256,
    /// Per-gas base fee, present under the fee-market rule set.
    base_fee: Option<U256>,
    /// Memoized hash of the block.
    hash: Option<H256>,
}

impl PartialEq for BlockHeader {
    fn eq(&self, o: &BlockHeader) -> bool {
        self.parent_hash == o.parent_hash
            && self.author == o.author
            && self.state_root == o.state_root
            && self.transactions_root == o.transactions_root
            && self.receipts_root == o.receipts_root
            && self.uncles_hash == o.uncles_hash
            && self.logs_bloom == o.logs_bloom
            && self.difficulty == o.difficulty
            && self.number == o.number
            && self.gas_limit == o.gas_limit
            && self.gas_used == o.gas_used
            && self.timestamp == o.timestamp
            && self.mix_hash == o.mix_hash
            && self.base_fee == o.base_fee
    }
}

impl BlockHeader {
    /// Get the parent_hash field of the header.
    pub fn parent_hash(&self) -> &H256 { &self.parent_hash }

    /// Get the author field of the header.
    pub fn author(&self) -> &Address { &self.author }

    /// Get the state root field of the header.
    pub fn state_root(&self) -> &H256 { &self.state_root }

    /// Get the transactions root field of the header.
    pub fn transactions_root(&self) -> &H256 { &self.transactions_root }

    /// Get the receipts root field of the header.
    pub fn receipts_root(&self) -> &H256 { &self.receipts_root }

    /// Get the uncles hash field of the header.
    pub fn uncles_hash(&self) -> &H256 { &self.uncles_hash }

    /// Get the logs bloom field of the header.
    pub fn logs_bloom(&self) -> &Bloom { &self.logs_bloom }

    /// Get the difficulty field of the header.
    pub fn difficulty(&self) -> &U256 { &self.difficulty }

    /// Get the block number.
    pub fn number(&self) -> u64 { self.number }

    /// Get the gas limit field of the header.
    pub fn gas_limit(&self) -> &U256 { &self.gas_limit }

    /// Get the gas used field of the header.
    pub fn gas_used(&self) -> &U256 { &self.gas_used }

    /// Get the timestamp field of the header.
    pub fn timestamp(&self) -> u64 { self.timestamp }

    /// Get the mix hash (post-merge randomness) field of the header.
    pub fn mix_hash(&self) -> &H256 { &self.mix_hash }

    /// Get the base fee field of the header.
    pub fn base_fee(&self) -> Option<U256> { self.base_fee }

    pub fn set_state_root(&mut self, state_root: H256) {
        self.state_root = state_root;
        self.hash = None;
    }

    pub fn set_transactions_root(&mut self, transactions_root: H256) {
        self.transactions_root = transactions_root;
        self.hash = None;
    }

    pub fn set_receipts_root(&mut self, receipts_root: H256) {
        self.receipts_root = receipts_root;
        self.hash = None;
    }

    pub fn set_uncles_hash(&mut self, uncles_hash: H256) {
        self.uncles_hash = uncles_hash;
        self.hash = None;
    }

    pub fn set_logs_bloom(&mut self, logs_bloom: Bloom) {
        self.logs_bloom = logs_bloom;
        self.hash = None;
    }

    pub fn set_gas_used(&mut self, gas_used: U256) {
        self.gas_used = gas_used;
        self.hash = None;
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
        self.hash = None;
    }

    /// Compute the hash of the block and memoize it.
    pub fn compute_hash(&mut self) -> H256 {
        let hash = self.hash();
        self.hash = Some(hash);
        hash
    }

    /// Get the hash of the block.
    pub fn hash(&self) -> H256 {
        self.hash.unwrap_or_else(|| keccak(self.rlp()))
    }

    /// Get the RLP representation of this header.
    pub fn rlp(&self) -> Bytes {
        let mut stream = RlpStream::new();
        self.stream_rlp(&mut stream);
        stream.out().to_vec()
    }

    /// Place this header into an RLP stream `stream`.
    fn stream_rlp(&self, stream: &mut RlpStream) {
        let list_len = 13 + self.base_fee.iter().count();
        stream
            .begin_list(list_len)
            .append(&self.parent_hash)
            .append(&self.author)
            .append(&self.state_root)
            .append(&self.transactions_root)
            .append(&self.receipts_root)
            .append(&self.uncles_hash)
            .append(&self.logs_bloom)
            .append(&self.difficulty)
            .append(&self.number)
            .append(&self.gas_limit)
            .append(&self.gas_used)
            .append(&self.timestamp)
            .append(&self.mix_hash);
        if let Some(ref base_fee) = self.base_fee {
            stream.append(base_fee);
        }
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, stream: &mut RlpStream) { self.stream_rlp(stream); }
}

impl Decodable for BlockHeader {
    fn decode(r: &Rlp) -> Result<Self, DecoderError> {
        let base_fee = match r.item_count()? {
            13 => None,
            14 => Some(r.val_at(13)?),
            _ => return Err(DecoderError::RlpIncorrectListLen),
        };
        Ok(BlockHeader {
            parent_hash: r.val_at(0)?,
            author: r.val_at(1)?,
            state_root: r.val_at(2)?,
            transactions_root: r.val_at(3)?,
            receipts_root: r.val_at(4)?,
            uncles_hash: r.val_at(5)?,
            logs_bloom: r.val_at(6)?,
            difficulty: r.val_at(7)?,
            number: r.val_at(8)?,
            gas_limit: r.val_at(9)?,
            gas_used: r.val_at(10)?,
            timestamp: r.val_at(11)?,
            mix_hash: r.val_at(12)?,
            base_fee,
            hash: Some(keccak(r.as_raw())),
        })
    }
}

pub struct BlockHeaderBuilder {
    parent_hash: H256,
    author: Address,
    state_root: H256,
    transactions_root: H256,
    receipts_root: H256,
    uncles_hash: H256,
    logs_bloom: Bloom,
    difficulty: U256,
    number: u64,
    gas_limit: U256,
    gas_used: U256,
    timestamp: u64,
    mix_hash: H256,
    base_fee: Option<U256>,
}

impl Default for BlockHeaderBuilder {
    fn default() -> Self { Self::new() }
}

impl BlockHeaderBuilder {
    pub fn new() -> Self {
        Self {
            parent_hash: H256::default(),
            author: Address::default(),
            state_root: KECCAK_NULL_RLP,
            transactions_root: KECCAK_EMPTY_LIST_RLP,
            receipts_root: KECCAK_EMPTY_LIST_RLP,
            uncles_hash: KECCAK_EMPTY_LIST_RLP,
            logs_bloom: Bloom::default(),
            difficulty: U256::default(),
            number: 0,
            gas_limit: U256::zero(),
            gas_used: U256::zero(),
            timestamp: 0,
            mix_hash: H256::default(),
            base_fee: None,
        }
    }

    pub fn with_parent_hash(&mut self, parent_hash: H256) -> &mut Self {
        self.parent_hash = parent_hash;
        self
    }

    pub fn with_author(&mut self, author: Address) -> &mut Self {
        self.author = author;
        self
    }

    pub fn with_state_root(&mut self, state_root: H256) -> &mut Self {
        self.state_root = state_root;
        self
    }

    pub fn with_transactions_root(
        &mut self, transactions_root: H256,
    ) -> &mut Self {
        self.transactions_root = transactions_root;
        self
    }

    pub fn with_receipts_root(&mut self, receipts_root: H256) -> &mut Self {
        self.receipts_root = receipts_root;
        self
    }

    pub fn with_uncles_hash(&mut self, uncles_hash: H256) -> &mut Self {
        self.uncles_hash = uncles_hash;
        self
    }

    pub fn with_logs_bloom(&mut self, logs_bloom: Bloom) -> &mut Self {
        self.logs_bloom = logs_bloom;
        self
    }

    pub fn with_difficulty(&mut self, difficulty: U256) -> &mut Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_number(&mut self, number: u64) -> &mut Self {
        self.number = number;
        self
    }

    pub fn with_gas_limit(&mut self, gas_limit: U256) -> &mut Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_gas_used(&mut self, gas_used: U256) -> &mut Self {
        self.gas_used = gas_used;
        self
    }

    pub fn with_timestamp(&mut self, timestamp: u64) -> &mut Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_mix_hash(&mut self, mix_hash: H256) -> &mut Self {
        self.mix_hash = mix_hash;
        self
    }

    pub fn with_base_fee(&mut self, base_fee: Option<U256>) -> &mut Self {
        self.base_fee = base_fee;
        self
    }

    pub fn build(&self) -> BlockHeader {
        BlockHeader {
            parent_hash: self.parent_hash,
            author: self.author,
            state_root: self.state_root,
            transactions_root: self.transactions_root,
            receipts_root: self.receipts_root,
            uncles_hash: self.uncles_hash,
            logs_bloom: self.logs_bloom,
            difficulty: self.difficulty,
            number: self.number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            mix_hash: self.mix_hash,
            base_fee: self.base_fee,
            hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rlp_round_trip_without_base_fee() {
        let header = BlockHeaderBuilder::new()
            .with_number(7)
            .with_gas_limit(10_000_000.into())
            .with_timestamp(1_600_000_000)
            .build();
        let decoded: BlockHeader =
            rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash(), header.hash());
        assert_eq!(decoded.base_fee(), None);
    }

    #[test]
    fn rlp_round_trip_with_base_fee() {
        let header = BlockHeaderBuilder::new()
            .with_number(12_965_000)
            .with_base_fee(Some(1_000_000_000u64.into()))
            .build();
        let decoded: BlockHeader =
            rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.base_fee(), Some(1_000_000_000u64.into()));
    }

    #[test]
    fn hash_changes_with_roots() {
        let mut header = BlockHeaderBuilder::new().with_number(1).build();
        let before = header.compute_hash();
        header.set_state_root(H256::repeat_byte(0xaa));
        assert_ne!(before, header.compute_hash());
    }
}
