// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Thin wrapper around `secp256k1` for recoverable transaction signatures.

use crate::hash::keccak;
use ethereum_types::{Address, H256, H512};
use lazy_static::lazy_static;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, Secp256k1, SecretKey,
};
use thiserror::Error;

lazy_static! {
    pub static ref SECP256K1: Secp256k1<All> = Secp256k1::new();
}

/// Uncompressed public key without the leading `0x04` tag byte.
pub type Public = H512;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),
}

/// Recover the signer's public key from a 64-byte compact signature, its
/// recovery id and the signed message digest.
pub fn recover(
    r: &H256, s: &H256, v: u8, message: &H256,
) -> Result<Public, CryptoError> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r.as_bytes());
    compact[32..].copy_from_slice(s.as_bytes());
    let signature = RecoverableSignature::from_compact(
        &compact,
        RecoveryId::from_i32(v as i32)?,
    )?;
    let public = SECP256K1.recover_ecdsa(
        &Message::from_digest_slice(message.as_bytes())?,
        &signature,
    )?;
    let serialized = public.serialize_uncompressed();
    Ok(Public::from_slice(&serialized[1..]))
}

/// Sign `message` with `secret`, returning `(r, s, v)` with the standard
/// 0/1 recovery id.
pub fn sign(
    secret: &SecretKey, message: &H256,
) -> Result<(H256, H256, u8), CryptoError> {
    let signature = SECP256K1.sign_ecdsa_recoverable(
        &Message::from_digest_slice(message.as_bytes())?,
        secret,
    );
    let (rec_id, compact) = signature.serialize_compact();
    Ok((
        H256::from_slice(&compact[..32]),
        H256::from_slice(&compact[32..]),
        rec_id.to_i32() as u8,
    ))
}

/// The address of a public key is the low 160 bits of its keccak hash.
pub fn public_to_address(public: &Public) -> Address {
    let hash = keccak(public);
    Address::from_slice(&hash[12..])
}

/// Public key for a secret, in the uncompressed 64-byte form.
pub fn public_from_secret(secret: &SecretKey) -> Public {
    let public = secp256k1::PublicKey::from_secret_key(&SECP256K1, secret);
    Public::from_slice(&public.serialize_uncompressed()[1..])
}
