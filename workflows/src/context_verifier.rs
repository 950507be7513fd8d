// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::verifier::{SignatureVerification, SignatureVerificationFuture, VerificationResults};
use canopy_types::{
    account::EvmAlias,
    key::{Key, clamp_threshold},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// The façade typed handlers (and the handle workflow itself) resolve
/// signature verifications through. Bound to the effective future map of one
/// transaction; every call gets a fresh deadline of the configured timeout.
///
/// Leaves are looked up by exact key equality; composite keys are recomposed
/// into compound promises on the fly. A key nothing signed for resolves to a
/// deterministic failure rather than an error.
pub struct HandleContextVerifier {
    results: VerificationResults,
    timeout: Duration,
}

impl HandleContextVerifier {
    pub fn new(results: VerificationResults, timeout: Duration) -> Self {
        Self { results, timeout }
    }

    pub fn verification_for(&self, key: &Key) -> SignatureVerification {
        let deadline = Instant::now() + self.timeout;
        self.future_for(key).resolve(deadline)
    }

    /// Answers a hollow-account lookup: the first seeded future whose
    /// derived alias matches. At most one can exist short of a keccak
    /// collision, so "first" is deterministic in effect.
    pub fn verification_for_alias(&self, alias: &EvmAlias) -> SignatureVerification {
        let deadline = Instant::now() + self.timeout;
        match self
            .results
            .values()
            .find(|future| future.evm_alias() == Some(alias))
        {
            Some(future) => future.resolve(deadline),
            None => SignatureVerification {
                key: Key::Unset,
                evm_alias: Some(*alias),
                passed: false,
            },
        }
    }

    fn future_for(&self, key: &Key) -> Arc<SignatureVerificationFuture> {
        match key {
            Key::Ed25519(_) | Key::EcdsaSecp256k1(_) => self
                .results
                .get(key)
                .cloned()
                .unwrap_or_else(|| Arc::new(SignatureVerificationFuture::Failed(key.clone()))),
            Key::KeyList(children) => self.compound_for(key, children, 0),
            Key::Threshold { threshold, keys } => {
                let clamped = clamp_threshold(*threshold, keys.len());
                let num_can_fail = keys.len().saturating_sub(clamped as usize);
                self.compound_for(key, keys, num_can_fail)
            },
            // Contract keys and the unsignable schemes can never carry a
            // signature here.
            _ => Arc::new(SignatureVerificationFuture::Failed(key.clone())),
        }
    }

    fn compound_for(
        &self,
        key: &Key,
        children: &[Key],
        num_can_fail: usize,
    ) -> Arc<SignatureVerificationFuture> {
        if children.is_empty() {
            return Arc::new(SignatureVerificationFuture::Failed(key.clone()));
        }
        let children = children.iter().map(|child| self.future_for(child)).collect();
        Arc::new(SignatureVerificationFuture::compound(
            key.clone(),
            children,
            num_can_fail,
        ))
    }
}
