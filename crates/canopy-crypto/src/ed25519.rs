// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use ed25519_dalek::{PublicKey, Signature};

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

/// Verifies an Ed25519 signature over `message`. Malformed keys or
/// signatures verify as false rather than erroring; the caller cannot do
/// anything else with them.
///
/// Uses strict verification, which rejects the malleable signatures and
/// small-order keys `verify` would accept. All nodes must agree on the
/// accepted signature set, so the stricter check is the only safe one.
pub fn verify_signature(key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::from_bytes(key) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    public_key.verify_strict(message, &signature).is_ok()
}
