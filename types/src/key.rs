// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;
pub const ECDSA_SECP256K1_COMPRESSED_KEY_LENGTH: usize = 33;
pub const ECDSA_SECP256K1_UNCOMPRESSED_KEY_LENGTH: usize = 65;

/// The key hierarchy an account (or any other signing requirement) can carry.
///
/// Only `Ed25519` and `EcdsaSecp256k1` leaves, and the two composites built
/// from them, participate in signing. The remaining variants are structurally
/// representable so state read from peers never fails to decode, but any
/// verification against them resolves to a deterministic failure.
#[derive(Clone, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Key {
    Ed25519(#[serde(with = "serde_bytes")] Vec<u8>),
    EcdsaSecp256k1(#[serde(with = "serde_bytes")] Vec<u8>),
    KeyList(Vec<Key>),
    Threshold { threshold: u32, keys: Vec<Key> },
    ContractId(u64),
    DelegatableContractId(u64),
    EcdsaP384(#[serde(with = "serde_bytes")] Vec<u8>),
    Rsa3072(#[serde(with = "serde_bytes")] Vec<u8>),
    Unset,
}

impl Key {
    /// True for the cryptographic leaves that can carry a signature.
    pub fn is_signing_leaf(&self) -> bool {
        matches!(self, Key::Ed25519(_) | Key::EcdsaSecp256k1(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Key::KeyList(_) | Key::Threshold { .. })
    }

    /// The raw public key bytes of a signing leaf.
    pub fn leaf_bytes(&self) -> Option<&[u8]> {
        match self {
            Key::Ed25519(bytes) | Key::EcdsaSecp256k1(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Collects every signing leaf in the tree, in declaration order.
    /// Duplicate leaves appear once per occurrence; callers deduplicate if
    /// they need set semantics.
    pub fn signing_leaves(&self) -> Vec<&Key> {
        let mut out = Vec::new();
        self.collect_signing_leaves(&mut out);
        out
    }

    fn collect_signing_leaves<'a>(&'a self, out: &mut Vec<&'a Key>) {
        match self {
            Key::Ed25519(_) | Key::EcdsaSecp256k1(_) => out.push(self),
            Key::KeyList(keys) | Key::Threshold { keys, .. } => {
                for key in keys {
                    key.collect_signing_leaves(out);
                }
            },
            _ => {},
        }
    }
}

/// Clamps a threshold into `[1, children]`. A threshold of zero is treated
/// as one; a threshold above the child count degenerates to "all must sign".
pub fn clamp_threshold(threshold: u32, children: usize) -> u32 {
    threshold.max(1).min(children as u32)
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Ed25519(bytes) => write!(f, "Ed25519({})", hex::encode(bytes)),
            Key::EcdsaSecp256k1(bytes) => write!(f, "EcdsaSecp256k1({})", hex::encode(bytes)),
            Key::KeyList(keys) => f.debug_tuple("KeyList").field(keys).finish(),
            Key::Threshold { threshold, keys } => f
                .debug_struct("Threshold")
                .field("threshold", threshold)
                .field("keys", keys)
                .finish(),
            Key::ContractId(num) => write!(f, "ContractId({num})"),
            Key::DelegatableContractId(num) => write!(f, "DelegatableContractId({num})"),
            Key::EcdsaP384(bytes) => write!(f, "EcdsaP384({})", hex::encode(bytes)),
            Key::Rsa3072(bytes) => write!(f, "Rsa3072({})", hex::encode(bytes)),
            Key::Unset => write!(f, "Unset"),
        }
    }
}
