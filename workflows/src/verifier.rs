// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::expander::ExpandedSignaturePair;
use canopy_crypto::{
    batch::BatchBuffer,
    engine::{CryptoEngine, CryptoJob, JobWaitError},
};
use canopy_types::{account::EvmAlias, key::Key};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::warn;

/// The settled outcome of verifying one key (leaf or compound).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureVerification {
    pub key: Key,
    pub evm_alias: Option<EvmAlias>,
    pub passed: bool,
}

impl SignatureVerification {
    pub fn passed(key: Key, evm_alias: Option<EvmAlias>) -> Self {
        Self {
            key,
            evm_alias,
            passed: true,
        }
    }

    pub fn failed(key: Key) -> Self {
        Self {
            key,
            evm_alias: None,
            passed: false,
        }
    }
}

#[derive(Debug)]
enum LeafState {
    Pending(CryptoJob),
    Resolved(bool),
}

/// A single in-flight cryptographic check, memoized after first resolution.
/// A timeout is memoized as failed: once any caller has observed the
/// downgrade, every later caller must observe the same verdict or nodes
/// could disagree with themselves.
#[derive(Debug)]
pub struct LeafFuture {
    key: Key,
    evm_alias: Option<EvmAlias>,
    state: Mutex<LeafState>,
}

impl LeafFuture {
    fn resolve(&self, deadline: Instant) -> SignatureVerification {
        let mut state = self.state.lock();
        let passed = match &*state {
            LeafState::Resolved(passed) => *passed,
            LeafState::Pending(job) => {
                let passed = match job.wait_deadline(deadline) {
                    Ok(passed) => passed,
                    Err(JobWaitError::Timeout) => {
                        warn!(
                            key = ?self.key,
                            "signature verification timed out; treating as failed. Honest nodes \
                             should have settled within the timeout, so an ISS may be imminent"
                        );
                        false
                    },
                    Err(JobWaitError::WorkerDropped) => {
                        warn!(key = ?self.key, "crypto worker dropped a verification job; treating as failed");
                        false
                    },
                };
                *state = LeafState::Resolved(passed);
                passed
            },
        };
        SignatureVerification {
            key: self.key.clone(),
            evm_alias: self.evm_alias,
            passed,
        }
    }
}

/// A verification promise: either one crypto job, a composition over child
/// promises tolerating `num_can_fail` failures, or an already-settled
/// failure (used for keys nothing signed for). Compounds are built at read
/// time by the handle-context verifier; pre-handle only ever seeds leaves.
#[derive(Debug)]
pub enum SignatureVerificationFuture {
    Leaf(LeafFuture),
    Compound {
        key: Key,
        children: Vec<Arc<SignatureVerificationFuture>>,
        num_can_fail: usize,
    },
    Failed(Key),
}

impl SignatureVerificationFuture {
    pub fn leaf(key: Key, evm_alias: Option<EvmAlias>, job: CryptoJob) -> Self {
        Self::Leaf(LeafFuture {
            key,
            evm_alias,
            state: Mutex::new(LeafState::Pending(job)),
        })
    }

    pub fn compound(
        key: Key,
        children: Vec<Arc<SignatureVerificationFuture>>,
        num_can_fail: usize,
    ) -> Self {
        Self::Compound {
            key,
            children,
            num_can_fail,
        }
    }

    /// A leaf settled without ever touching the crypto engine.
    #[cfg(any(test, feature = "fuzzing"))]
    pub fn resolved_leaf(key: Key, evm_alias: Option<EvmAlias>, passed: bool) -> Self {
        Self::Leaf(LeafFuture {
            key,
            evm_alias,
            state: Mutex::new(LeafState::Resolved(passed)),
        })
    }

    pub fn key(&self) -> &Key {
        match self {
            Self::Leaf(leaf) => &leaf.key,
            Self::Compound { key, .. } => key,
            Self::Failed(key) => key,
        }
    }

    pub fn evm_alias(&self) -> Option<&EvmAlias> {
        match self {
            Self::Leaf(leaf) => leaf.evm_alias.as_ref(),
            _ => None,
        }
    }

    /// Drives the promise to a verdict, never waiting past `deadline`.
    ///
    /// Compounds resolve children in order and short-circuit to failed as
    /// soon as more than `num_can_fail` children have failed; the deadline
    /// is shared by the whole tree rather than re-budgeted per child.
    pub fn resolve(&self, deadline: Instant) -> SignatureVerification {
        match self {
            Self::Leaf(leaf) => leaf.resolve(deadline),
            Self::Compound {
                key,
                children,
                num_can_fail,
            } => {
                let mut failed = 0usize;
                for child in children {
                    if !child.resolve(deadline).passed {
                        failed += 1;
                        if failed > *num_can_fail {
                            return SignatureVerification::failed(key.clone());
                        }
                    }
                }
                SignatureVerification::passed(key.clone(), None)
            },
            Self::Failed(key) => SignatureVerification::failed(key.clone()),
        }
    }
}

/// Futures seeded by pre-handle, keyed by exact leaf key equality.
pub type VerificationResults = HashMap<Key, Arc<SignatureVerificationFuture>>;

/// C2 façade: packs expanded pairs into per-scheme batch buffers, submits
/// each batch to the crypto engine in one call, and hands back one leaf
/// future per pair.
#[derive(Clone)]
pub struct SignatureVerifier {
    engine: Arc<dyn CryptoEngine>,
}

impl SignatureVerifier {
    pub fn new(engine: Arc<dyn CryptoEngine>) -> Self {
        Self { engine }
    }

    pub fn verify(
        &self,
        signed_bytes: &[u8],
        pairs: &[ExpandedSignaturePair],
    ) -> VerificationResults {
        let mut ed25519_pairs = Vec::new();
        let mut ecdsa_pairs = Vec::new();
        for pair in pairs {
            match &pair.key {
                Key::Ed25519(_) => ed25519_pairs.push(pair),
                Key::EcdsaSecp256k1(_) => ecdsa_pairs.push(pair),
                // Expansion only emits signing leaves.
                _ => {},
            }
        }

        let mut results = VerificationResults::new();
        if !ed25519_pairs.is_empty() {
            self.submit_scheme(
                BatchBuffer::ed25519(signed_bytes),
                &ed25519_pairs,
                &mut results,
            );
        }
        if !ecdsa_pairs.is_empty() {
            // The ECDSA buffer hashes the payload once for the whole batch.
            self.submit_scheme(
                BatchBuffer::ecdsa_secp256k1(signed_bytes),
                &ecdsa_pairs,
                &mut results,
            );
        }
        results
    }

    fn submit_scheme(
        &self,
        mut batch: BatchBuffer,
        pairs: &[&ExpandedSignaturePair],
        results: &mut VerificationResults,
    ) {
        for pair in pairs {
            batch.push_job(&pair.signature, &pair.key_bytes);
        }
        let jobs = self.engine.submit_batch(batch);
        for (pair, job) in pairs.iter().zip(jobs) {
            results.insert(
                pair.key.clone(),
                Arc::new(SignatureVerificationFuture::leaf(
                    pair.key.clone(),
                    pair.evm_alias,
                    job,
                )),
            );
        }
    }
}
