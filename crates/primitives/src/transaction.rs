// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    bytes::Bytes,
    crypto::{public_to_address, recover, sign, CryptoError, Public},
    hash::keccak,
};
use ethereum_types::{Address, BigEndianHash, H160, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use secp256k1::SecretKey;
use std::{
    cmp::min,
    ops::{Deref, DerefMut},
};
use thiserror::Error;

/// Fake address for unsigned transactions.
pub const UNSIGNED_SENDER: Address = H160([0xff; 20]);

pub const LEGACY_TX_TYPE: u8 = 0x00;
pub const ACCESS_LIST_TX_TYPE: u8 = 0x01;
pub const FEE_MARKET_TX_TYPE: u8 = 0x02;

/// Errors concerning transaction admission.
#[derive(Debug, PartialEq, Clone, Error)]
pub enum TransactionError {
    /// Signature error
    #[error("transaction has invalid signature: {0}")]
    InvalidSignature(String),
    /// The transaction names a chain other than the executing one.
    #[error("transaction chain id {got} does not match chain id {expected}")]
    WrongChainId { expected: u64, got: u64 },
    /// Invalid RLP encoding
    #[error("transaction has invalid RLP structure: {0}")]
    InvalidRlp(String),
}

impl From<CryptoError> for TransactionError {
    fn from(err: CryptoError) -> Self {
        TransactionError::InvalidSignature(format!("{}", err))
    }
}

impl From<DecoderError> for TransactionError {
    fn from(err: DecoderError) -> Self {
        TransactionError::InvalidRlp(format!("{}", err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create creates new contract.
    Create,
    /// Calls contract at given address.
    /// In the case of a transfer, this is the receiver's address.
    Call(Address),
}

impl Default for Action {
    fn default() -> Action { Action::Create }
}

impl Decodable for Action {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.is_empty() {
            Ok(Action::Create)
        } else {
            Ok(Action::Call(rlp.as_val()?))
        }
    }
}

impl Encodable for Action {
    fn rlp_append(&self, stream: &mut RlpStream) {
        match *self {
            Action::Create => stream.append_internal(&""),
            Action::Call(ref address) => stream.append_internal(address),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl Encodable for AccessListItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list(&self.storage_keys);
    }
}

impl Decodable for AccessListItem {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

pub type AccessList = Vec<AccessListItem>;

/// The original transaction format, with optional replay protection in the
/// signature's `v` component.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct LegacyTransaction {
    /// Nonce.
    pub nonce: U256,
    /// Gas price.
    pub gas_price: U256,
    /// Gas paid up front for transaction execution.
    pub gas: U256,
    /// Action, can be either call or contract create.
    pub action: Action,
    /// Transferred value.
    pub value: U256,
    /// Transaction data.
    pub data: Bytes,
    /// The chain id of the transaction, when replay protected.
    pub chain_id: Option<u64>,
}

impl LegacyTransaction {
    /// The pre-image of the signature, with replay protection when a chain
    /// id is present.
    fn rlp_append_signature_payload(&self, s: &mut RlpStream) {
        match self.chain_id {
            Some(chain_id) => {
                s.begin_list(9);
                s.append(&self.nonce);
                s.append(&self.gas_price);
                s.append(&self.gas);
                s.append(&self.action);
                s.append(&self.value);
                s.append(&self.data);
                s.append(&chain_id);
                s.append(&0u8);
                s.append(&0u8);
            }
            None => {
                s.begin_list(6);
                s.append(&self.nonce);
                s.append(&self.gas_price);
                s.append(&self.gas);
                s.append(&self.action);
                s.append(&self.value);
                s.append(&self.data);
            }
        }
    }
}

/// Transaction with an explicit access list (tx type 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListTransaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas: U256,
    pub action: Action,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
}

impl AccessListTransaction {
    fn rlp_append_signature_payload(&self, s: &mut RlpStream) {
        s.begin_list(8);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas);
        s.append(&self.action);
        s.append(&self.value);
        s.append(&self.data);
        s.append_list(&self.access_list);
    }
}

/// Fee-market transaction with a fee cap and a priority fee (tx type 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeMarketTransaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas: U256,
    pub action: Action,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
}

impl FeeMarketTransaction {
    fn rlp_append_signature_payload(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.max_fee_per_gas);
        s.append(&self.gas);
        s.append(&self.action);
        s.append(&self.value);
        s.append(&self.data);
        s.append_list(&self.access_list);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Legacy(LegacyTransaction),
    AccessList(AccessListTransaction),
    FeeMarket(FeeMarketTransaction),
}

impl Default for Transaction {
    fn default() -> Self { Transaction::Legacy(Default::default()) }
}

impl From<LegacyTransaction> for Transaction {
    fn from(tx: LegacyTransaction) -> Self { Transaction::Legacy(tx) }
}

impl From<AccessListTransaction> for Transaction {
    fn from(tx: AccessListTransaction) -> Self { Transaction::AccessList(tx) }
}

impl From<FeeMarketTransaction> for Transaction {
    fn from(tx: FeeMarketTransaction) -> Self { Transaction::FeeMarket(tx) }
}

macro_rules! access_common_ref {
    ($field:ident, $ty:ty) => {
        pub fn $field(&self) -> &$ty {
            match self {
                Transaction::Legacy(tx) => &tx.$field,
                Transaction::AccessList(tx) => &tx.$field,
                Transaction::FeeMarket(tx) => &tx.$field,
            }
        }
    };
}

impl Transaction {
    access_common_ref!(gas, U256);

    access_common_ref!(data, Bytes);

    access_common_ref!(nonce, U256);

    access_common_ref!(action, Action);

    access_common_ref!(value, U256);

    pub fn tx_type(&self) -> u8 {
        match self {
            Transaction::Legacy(_) => LEGACY_TX_TYPE,
            Transaction::AccessList(_) => ACCESS_LIST_TX_TYPE,
            Transaction::FeeMarket(_) => FEE_MARKET_TX_TYPE,
        }
    }

    /// The price bid by the transaction. For a fee-market transaction this
    /// is the fee cap; the price actually charged depends on the block's
    /// base fee.
    pub fn gas_price(&self) -> &U256 {
        match self {
            Transaction::Legacy(tx) => &tx.gas_price,
            Transaction::AccessList(tx) => &tx.gas_price,
            Transaction::FeeMarket(tx) => &tx.max_fee_per_gas,
        }
    }

    pub fn max_priority_gas_price(&self) -> &U256 {
        match self {
            Transaction::Legacy(tx) => &tx.gas_price,
            Transaction::AccessList(tx) => &tx.gas_price,
            Transaction::FeeMarket(tx) => &tx.max_priority_fee_per_gas,
        }
    }

    /// The per-gas price charged to the sender under the given base fee:
    /// `min(fee cap, base fee + priority fee)`. Pre-fee-market transactions
    /// pay their bid unchanged.
    pub fn effective_gas_price(&self, base_fee: &U256) -> U256 {
        match self {
            Transaction::FeeMarket(tx) => min(
                tx.max_fee_per_gas,
                base_fee.saturating_add(tx.max_priority_fee_per_gas),
            ),
            _ => *self.gas_price(),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.chain_id,
            Transaction::AccessList(tx) => Some(tx.chain_id),
            Transaction::FeeMarket(tx) => Some(tx.chain_id),
        }
    }

    pub fn access_list(&self) -> Option<&AccessList> {
        match self {
            Transaction::Legacy(_) => None,
            Transaction::AccessList(tx) => Some(&tx.access_list),
            Transaction::FeeMarket(tx) => Some(&tx.access_list),
        }
    }

    pub fn nonce_mut(&mut self) -> &mut U256 {
        match self {
            Transaction::Legacy(tx) => &mut tx.nonce,
            Transaction::AccessList(tx) => &mut tx.nonce,
            Transaction::FeeMarket(tx) => &mut tx.nonce,
        }
    }

    /// The digest the sender signs. Typed payloads are prefixed with their
    /// type byte before hashing.
    pub fn signature_hash(&self) -> H256 {
        let mut stream = RlpStream::new();
        match self {
            Transaction::Legacy(tx) => {
                tx.rlp_append_signature_payload(&mut stream);
                keccak(stream.out())
            }
            Transaction::AccessList(tx) => {
                tx.rlp_append_signature_payload(&mut stream);
                let mut payload = vec![ACCESS_LIST_TX_TYPE];
                payload.extend_from_slice(stream.as_raw());
                keccak(&payload)
            }
            Transaction::FeeMarket(tx) => {
                tx.rlp_append_signature_payload(&mut stream);
                let mut payload = vec![FEE_MARKET_TX_TYPE];
                payload.extend_from_slice(stream.as_raw());
                keccak(&payload)
            }
        }
    }

    /// Sign the transaction, recording the standard 0/1 recovery id.
    pub fn sign(self, secret: &SecretKey) -> SignedTransaction {
        let (r, s, v) = sign(secret, &self.signature_hash())
            .expect("signing with a valid secret cannot fail");
        let tx_with_sig = TransactionWithSignature {
            unsigned: self,
            v,
            r: r.into_uint(),
            s: s.into_uint(),
            hash: H256::zero(),
        }
        .compute_hash();
        let public = tx_with_sig
            .recover_public()
            .expect("a fresh signature must recover");
        SignedTransaction::new(public, tx_with_sig)
    }

    /// Fake sign for tests and local calls: the resulting transaction fails
    /// real signature verification but carries an asserted sender.
    pub fn fake_sign(self, from: Address) -> SignedTransaction {
        SignedTransaction {
            transaction: TransactionWithSignature {
                unsigned: self,
                r: U256::one(),
                s: U256::one(),
                v: 0,
                hash: H256::zero(),
            }
            .compute_hash(),
            sender: from,
            public: None,
        }
    }
}

/// Signed transaction information without verified signature.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionWithSignature {
    pub unsigned: Transaction,
    /// Standard recovery id (0 or 1).
    pub v: u8,
    /// The R field of the signature.
    pub r: U256,
    /// The S field of the signature.
    pub s: U256,
    /// Hash of the transaction.
    pub hash: H256,
}

impl Deref for TransactionWithSignature {
    type Target = Transaction;

    fn deref(&self) -> &Self::Target { &self.unsigned }
}

// All transactions, including the legacy format, are stored as
// `[type, fields..., v, r, s]`. The block store is engine-owned, so the
// encoding does not need to match any foreign wire format; legacy `v` still
// carries the replay-protection chain id so it survives a round trip.
impl Encodable for TransactionWithSignature {
    fn rlp_append(&self, s: &mut RlpStream) {
        match &self.unsigned {
            Transaction::Legacy(tx) => {
                s.begin_list(10);
                s.append(&LEGACY_TX_TYPE);
                s.append(&tx.nonce);
                s.append(&tx.gas_price);
                s.append(&tx.gas);
                s.append(&tx.action);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append(&replay_protection::encode(self.v, tx.chain_id));
                s.append(&self.r);
                s.append(&self.s);
            }
            Transaction::AccessList(tx) => {
                s.begin_list(12);
                s.append(&ACCESS_LIST_TX_TYPE);
                s.append(&tx.chain_id);
                s.append(&tx.nonce);
                s.append(&tx.gas_price);
                s.append(&tx.gas);
                s.append(&tx.action);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append_list(&tx.access_list);
                s.append(&self.v);
                s.append(&self.r);
                s.append(&self.s);
            }
            Transaction::FeeMarket(tx) => {
                s.begin_list(13);
                s.append(&FEE_MARKET_TX_TYPE);
                s.append(&tx.chain_id);
                s.append(&tx.nonce);
                s.append(&tx.max_priority_fee_per_gas);
                s.append(&tx.max_fee_per_gas);
                s.append(&tx.gas);
                s.append(&tx.action);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append_list(&tx.access_list);
                s.append(&self.v);
                s.append(&self.r);
                s.append(&self.s);
            }
        }
    }
}

impl Decodable for TransactionWithSignature {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let tx_type: u8 = rlp.val_at(0)?;
        let (unsigned, v, r, s) = match tx_type {
            LEGACY_TX_TYPE => {
                if rlp.item_count()? != 10 {
                    return Err(DecoderError::RlpIncorrectListLen);
                }
                let protected_v: u64 = rlp.val_at(7)?;
                let tx = LegacyTransaction {
                    nonce: rlp.val_at(1)?,
                    gas_price: rlp.val_at(2)?,
                    gas: rlp.val_at(3)?,
                    action: rlp.val_at(4)?,
                    value: rlp.val_at(5)?,
                    data: rlp.val_at(6)?,
                    chain_id: replay_protection::decode_chain_id(protected_v),
                };
                (
                    Transaction::Legacy(tx),
                    replay_protection::decode_parity(protected_v),
                    rlp.val_at(8)?,
                    rlp.val_at(9)?,
                )
            }
            ACCESS_LIST_TX_TYPE => {
                if rlp.item_count()? != 12 {
                    return Err(DecoderError::RlpIncorrectListLen);
                }
                let tx = AccessListTransaction {
                    chain_id: rlp.val_at(1)?,
                    nonce: rlp.val_at(2)?,
                    gas_price: rlp.val_at(3)?,
                    gas: rlp.val_at(4)?,
                    action: rlp.val_at(5)?,
                    value: rlp.val_at(6)?,
                    data: rlp.val_at(7)?,
                    access_list: rlp.list_at(8)?,
                };
                (
                    Transaction::AccessList(tx),
                    rlp.val_at(9)?,
                    rlp.val_at(10)?,
                    rlp.val_at(11)?,
                )
            }
            FEE_MARKET_TX_TYPE => {
                if rlp.item_count()? != 13 {
                    return Err(DecoderError::RlpIncorrectListLen);
                }
                let tx = FeeMarketTransaction {
                    chain_id: rlp.val_at(1)?,
                    nonce: rlp.val_at(2)?,
                    max_priority_fee_per_gas: rlp.val_at(3)?,
                    max_fee_per_gas: rlp.val_at(4)?,
                    gas: rlp.val_at(5)?,
                    action: rlp.val_at(6)?,
                    value: rlp.val_at(7)?,
                    data: rlp.val_at(8)?,
                    access_list: rlp.list_at(9)?,
                };
                (
                    Transaction::FeeMarket(tx),
                    rlp.val_at(10)?,
                    rlp.val_at(11)?,
                    rlp.val_at(12)?,
                )
            }
            _ => return Err(DecoderError::Custom("unknown transaction type")),
        };
        Ok(TransactionWithSignature {
            unsigned,
            v,
            r,
            s,
            hash: keccak(rlp.as_raw()),
        })
    }
}

impl TransactionWithSignature {
    pub fn new_unsigned(tx: Transaction) -> Self {
        TransactionWithSignature {
            unsigned: tx,
            s: 0.into(),
            r: 0.into(),
            v: 0,
            hash: Default::default(),
        }
    }

    /// Used to compute hash of created transactions.
    fn compute_hash(mut self) -> TransactionWithSignature {
        self.hash = keccak(&*self.rlp_bytes());
        self
    }

    /// Checks whether signature is empty.
    pub fn is_unsigned(&self) -> bool { self.r.is_zero() && self.s.is_zero() }

    pub fn hash(&self) -> H256 { self.hash }

    /// Recovers the public key of the sender.
    pub fn recover_public(&self) -> Result<Public, TransactionError> {
        let r: H256 = BigEndianHash::from_uint(&self.r);
        let s: H256 = BigEndianHash::from_uint(&self.s);
        Ok(recover(&r, &s, self.v, &self.unsigned.signature_hash())?)
    }

    pub fn from_raw(raw: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(raw)
    }
}

/// A signed transaction with successfully recovered `sender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: TransactionWithSignature,
    pub sender: Address,
    pub public: Option<Public>,
}

// The default encoder for local storage. The public key cache is not
// serialized; it is recovered again on demand.
impl Encodable for SignedTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.transaction);
        s.append(&self.sender);
    }
}

impl Decodable for SignedTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(SignedTransaction {
            transaction: rlp.val_at(0)?,
            sender: rlp.val_at(1)?,
            public: None,
        })
    }
}

impl Deref for SignedTransaction {
    type Target = TransactionWithSignature;

    fn deref(&self) -> &Self::Target { &self.transaction }
}

impl DerefMut for SignedTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.transaction }
}

impl From<SignedTransaction> for TransactionWithSignature {
    fn from(tx: SignedTransaction) -> Self { tx.transaction }
}

impl SignedTransaction {
    pub fn new(public: Public, transaction: TransactionWithSignature) -> Self {
        if transaction.is_unsigned() {
            SignedTransaction {
                transaction,
                sender: UNSIGNED_SENDER,
                public: None,
            }
        } else {
            let sender = public_to_address(&public);
            SignedTransaction {
                transaction,
                sender,
                public: Some(public),
            }
        }
    }

    pub fn new_unsigned(transaction: TransactionWithSignature) -> Self {
        SignedTransaction {
            transaction,
            sender: UNSIGNED_SENDER,
            public: None,
        }
    }

    /// Returns transaction sender.
    pub fn sender(&self) -> Address { self.sender }

    pub fn nonce(&self) -> &U256 { self.transaction.nonce() }

    /// Checks if signature is empty.
    pub fn is_unsigned(&self) -> bool { self.transaction.is_unsigned() }

    pub fn hash(&self) -> H256 { self.transaction.hash() }

    pub fn gas(&self) -> &U256 { self.transaction.gas() }

    pub fn gas_price(&self) -> &U256 { self.transaction.gas_price() }

    pub fn gas_limit(&self) -> &U256 { self.transaction.gas() }

    /// Verify the signature against the cached public key, recovering it
    /// when absent.
    pub fn verify_public(&self) -> Result<bool, TransactionError> {
        if self.transaction.is_unsigned() {
            return Ok(false);
        }
        let recovered = self.transaction.recover_public()?;
        match self.public {
            Some(public) => Ok(public == recovered),
            None => Ok(public_to_address(&recovered) == self.sender),
        }
    }
}

/// The `v` component of a legacy signature doubles as replay protection:
/// a protected transaction records `chain_id * 2 + 35 + parity`, an
/// unprotected one the historical `27 + parity`. Both directions live
/// here so the two encodings cannot drift apart.
pub mod replay_protection {
    /// Record the 0/1 recovery parity, folding in the chain id when the
    /// transaction is replay protected.
    pub fn encode(parity: u8, chain_id: Option<u64>) -> u64 {
        let parity = parity as u64;
        match chain_id {
            Some(id) => id * 2 + 35 + parity,
            None => 27 + parity,
        }
    }

    /// The 0/1 recovery parity of a recorded `v`. Values fitting neither
    /// encoding yield a parity no signature can carry, so recovery fails
    /// downstream instead of silently misreading the transaction.
    pub fn decode_parity(v: u64) -> u8 {
        match v {
            27 | 28 => (v - 27) as u8,
            v if v >= 35 => ((v - 35) % 2) as u8,
            _ => u8::MAX,
        }
    }

    /// The chain id of a recorded `v`, absent for unprotected
    /// transactions.
    pub fn decode_chain_id(v: u64) -> Option<u64> {
        if v >= 35 {
            Some((v - 35) / 2)
        } else {
            None
        }
    }

}
