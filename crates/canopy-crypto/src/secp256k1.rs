// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use libsecp256k1::{Message, PublicKey, Signature};
use tiny_keccak::{Hasher, Keccak};

pub const COMPRESSED_KEY_LENGTH: usize = 33;
pub const UNCOMPRESSED_KEY_LENGTH: usize = 65;
pub const SIGNATURE_LENGTH: usize = 64;
pub const EVM_ALIAS_LENGTH: usize = 20;

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Verifies an ECDSA secp256k1 signature over a 32-byte digest (the
/// keccak256 of the signed payload, precomputed once per batch). Accepts
/// the key in compressed or uncompressed form; anything malformed fails
/// closed.
pub fn verify_prehashed(key: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::parse_slice(key, None) else {
        return false;
    };
    let Ok(signature) = Signature::parse_standard_slice(signature) else {
        return false;
    };
    libsecp256k1::verify(&Message::parse(digest), &signature, &public_key)
}

/// Derives the 20-byte EVM alias of an ECDSA public key:
/// `keccak256(uncompressed_key[1..])[12..32]`. Returns `None` when the bytes
/// do not parse as a point on the curve.
pub fn evm_alias(key: &[u8]) -> Option<[u8; EVM_ALIAS_LENGTH]> {
    let public_key = PublicKey::parse_slice(key, None).ok()?;
    let uncompressed = public_key.serialize();
    let digest = keccak256(&uncompressed[1..]);
    let mut alias = [0u8; EVM_ALIAS_LENGTH];
    alias.copy_from_slice(&digest[12..32]);
    Some(alias)
}
