// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    block_header::BlockHeader, hash::keccak, receipt::Receipt,
    transaction::SignedTransaction,
};
use ethereum_types::H256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use std::sync::Arc;

pub type BlockNumber = u64;

/// A block: a header plus the ordered transaction list and the uncle
/// headers it commits to.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// The header of this block.
    pub block_header: BlockHeader,
    /// The transactions in this block.
    pub transactions: Vec<Arc<SignedTransaction>>,
    /// Uncle headers referenced by this block, where the active rule set
    /// still has uncles.
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    pub fn new(
        block_header: BlockHeader, transactions: Vec<Arc<SignedTransaction>>,
        uncles: Vec<BlockHeader>,
    ) -> Self {
        Block {
            block_header,
            transactions,
            uncles,
        }
    }

    pub fn hash(&self) -> H256 { self.block_header.hash() }

    pub fn transaction_hashes(&self) -> Vec<H256> {
        self.transactions
            .iter()
            .map(|tx| tx.hash())
            .collect::<Vec<_>>()
    }

    /// The commitment of the transaction list: the hash of the RLP-appended
    /// signed payloads, in block order.
    pub fn compute_transaction_root(
        transactions: &[Arc<SignedTransaction>],
    ) -> H256 {
        let mut rlp_stream = RlpStream::new_list(transactions.len());
        for tx in transactions {
            rlp_stream.append(&tx.transaction);
        }
        keccak(rlp_stream.out())
    }

    /// The commitment of the receipt list, in block order.
    pub fn compute_receipts_root(receipts: &[Receipt]) -> H256 {
        let mut rlp_stream = RlpStream::new_list(receipts.len());
        for receipt in receipts {
            rlp_stream.append(receipt);
        }
        keccak(rlp_stream.out())
    }

    /// The commitment of the uncle header list.
    pub fn compute_uncles_hash(uncles: &[BlockHeader]) -> H256 {
        let mut rlp_stream = RlpStream::new_list(uncles.len());
        for uncle in uncles {
            rlp_stream.append(uncle);
        }
        keccak(rlp_stream.out())
    }
}

impl Encodable for Block {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(3).append(&self.block_header);
        stream.begin_list(self.transactions.len());
        for tx in &self.transactions {
            stream.append(tx.as_ref());
        }
        stream.append_list(&self.uncles);
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let transactions = rlp
            .at(1)?
            .as_list::<SignedTransaction>()?
            .into_iter()
            .map(Arc::new)
            .collect();
        Ok(Block {
            block_header: rlp.val_at(0)?,
            transactions,
            uncles: rlp.list_at(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_header::BlockHeaderBuilder,
        hash::KECCAK_EMPTY_LIST_RLP,
        transaction::{Action, LegacyTransaction, Transaction},
    };
    use ethereum_types::Address;

    #[test]
    fn empty_list_roots_match_the_empty_constant() {
        assert_eq!(Block::compute_transaction_root(&[]), KECCAK_EMPTY_LIST_RLP);
        assert_eq!(Block::compute_receipts_root(&[]), KECCAK_EMPTY_LIST_RLP);
        assert_eq!(Block::compute_uncles_hash(&[]), KECCAK_EMPTY_LIST_RLP);
    }

    #[test]
    fn transaction_root_depends_on_order() {
        let tx = |nonce: u64| {
            Arc::new(
                Transaction::Legacy(LegacyTransaction {
                    nonce: nonce.into(),
                    gas_price: 1.into(),
                    gas: 21000.into(),
                    action: Action::Call(Address::zero()),
                    value: 0.into(),
                    data: vec![],
                    chain_id: Some(1),
                })
                .fake_sign(Address::repeat_byte(0x01)),
            )
        };
        let forward = Block::compute_transaction_root(&[tx(0), tx(1)]);
        let reversed = Block::compute_transaction_root(&[tx(1), tx(0)]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn block_rlp_round_trip() {
        let header = BlockHeaderBuilder::new().with_number(3).build();
        let uncle = BlockHeaderBuilder::new()
            .with_number(2)
            .with_author(Address::repeat_byte(0x03))
            .build();
        let tx = Transaction::Legacy(LegacyTransaction {
            nonce: 0.into(),
            gas_price: 10.into(),
            gas: 21000.into(),
            action: Action::Call(Address::repeat_byte(0x02)),
            value: 5.into(),
            data: vec![],
            chain_id: None,
        })
        .fake_sign(Address::repeat_byte(0x01));
        let block = Block::new(header, vec![Arc::new(tx)], vec![uncle]);
        let decoded: Block = rlp::decode(&rlp::encode(&block)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn uncles_hash_depends_on_uncle_content() {
        let uncle = |author: u8| {
            BlockHeaderBuilder::new()
                .with_number(1)
                .with_author(Address::repeat_byte(author))
                .build()
        };
        assert_ne!(
            Block::compute_uncles_hash(&[uncle(0x01)]),
            Block::compute_uncles_hash(&[uncle(0x02)])
        );
    }
}
