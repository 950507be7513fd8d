// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

//! Deterministic signers for tests. Seeded construction keeps fixtures
//! byte-stable across runs and platforms.

use crate::secp256k1::{evm_alias, keccak256};
use ed25519_dalek::{ExpandedSecretKey, PublicKey, SecretKey};
use libsecp256k1::{Message, SecretKey as EcdsaSecretKey, sign};

pub struct Ed25519Signer {
    secret: SecretKey,
    public: PublicKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = SecretKey::from_bytes(&seed).expect("seed is the key length");
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.public.as_bytes().to_vec()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let expanded = ExpandedSecretKey::from(&self.secret);
        expanded.sign(message, &self.public).to_bytes().to_vec()
    }
}

pub struct EcdsaSigner {
    secret: EcdsaSecretKey,
}

impl EcdsaSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = EcdsaSecretKey::parse(&seed).expect("seed is a valid scalar");
        Self { secret }
    }

    fn public(&self) -> libsecp256k1::PublicKey {
        libsecp256k1::PublicKey::from_secret_key(&self.secret)
    }

    pub fn public_key_compressed(&self) -> Vec<u8> {
        self.public().serialize_compressed().to_vec()
    }

    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.public().serialize().to_vec()
    }

    pub fn alias(&self) -> [u8; 20] {
        evm_alias(&self.public_key_compressed()).expect("key is on the curve")
    }

    pub fn sign_digest(&self, digest: &[u8; 32]) -> Vec<u8> {
        let (signature, _recovery) = sign(&Message::parse(digest), &self.secret);
        signature.serialize().to_vec()
    }

    /// Signs the keccak256 of `payload`, the digest ECDSA verification in
    /// this workspace operates on.
    pub fn sign_payload(&self, payload: &[u8]) -> Vec<u8> {
        self.sign_digest(&keccak256(payload))
    }
}
