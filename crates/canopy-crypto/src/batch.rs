// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{ed25519, secp256k1};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureScheme {
    Ed25519,
    EcdsaSecp256k1,
}

/// Byte ranges of one verification job inside its batch buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobSpec {
    pub signed_offset: usize,
    pub signed_len: usize,
    pub sig_offset: usize,
    pub sig_len: usize,
    pub key_offset: usize,
    pub key_len: usize,
}

/// A batch of same-scheme verification jobs sharing one growable buffer:
/// the signed message first, then `signature_i ++ key_i` per job, with the
/// ranges recorded in [`JobSpec`]s. One buffer exists per scheme because
/// ECDSA verifies against the keccak256 of the signed bytes, which is
/// computed once here rather than once per signature.
#[derive(Clone, Debug)]
pub struct BatchBuffer {
    scheme: SignatureScheme,
    bytes: Vec<u8>,
    message_len: usize,
    jobs: Vec<JobSpec>,
}

impl BatchBuffer {
    pub fn ed25519(signed_bytes: &[u8]) -> Self {
        Self {
            scheme: SignatureScheme::Ed25519,
            bytes: signed_bytes.to_vec(),
            message_len: signed_bytes.len(),
            jobs: Vec::new(),
        }
    }

    pub fn ecdsa_secp256k1(signed_bytes: &[u8]) -> Self {
        let digest = secp256k1::keccak256(signed_bytes);
        Self {
            scheme: SignatureScheme::EcdsaSecp256k1,
            bytes: digest.to_vec(),
            message_len: digest.len(),
            jobs: Vec::new(),
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    /// Appends one `(signature, key)` pair and returns its job index.
    pub fn push_job(&mut self, signature: &[u8], key: &[u8]) -> usize {
        let sig_offset = self.bytes.len();
        self.bytes.extend_from_slice(signature);
        let key_offset = self.bytes.len();
        self.bytes.extend_from_slice(key);
        self.jobs.push(JobSpec {
            signed_offset: 0,
            signed_len: self.message_len,
            sig_offset,
            sig_len: signature.len(),
            key_offset,
            key_len: key.len(),
        });
        self.jobs.len() - 1
    }

    /// Runs the actual cryptographic check for one job of this batch.
    pub fn verify_job(&self, job: &JobSpec) -> bool {
        let message = &self.bytes[job.signed_offset..job.signed_offset + job.signed_len];
        let signature = &self.bytes[job.sig_offset..job.sig_offset + job.sig_len];
        let key = &self.bytes[job.key_offset..job.key_offset + job.key_len];
        match self.scheme {
            SignatureScheme::Ed25519 => ed25519::verify_signature(key, message, signature),
            SignatureScheme::EcdsaSecp256k1 => {
                let digest: &[u8; 32] = match message.try_into() {
                    Ok(digest) => digest,
                    Err(_) => return false,
                };
                secp256k1::verify_prehashed(key, digest, signature)
            },
        }
    }
}
