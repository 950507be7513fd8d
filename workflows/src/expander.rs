// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use canopy_crypto::secp256k1;
use canopy_types::{
    account::EvmAlias,
    key::Key,
    transaction::{SignatureKind, SignatureMap, SignaturePair},
};
use std::collections::HashSet;
use thiserror::Error;

/// A signature matched to the concrete key it claims to cover. For ECDSA
/// keys the derived EVM alias rides along so hollow-account lookups can be
/// answered from the same expansion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExpandedSignaturePair {
    pub key: Key,
    pub key_bytes: Vec<u8>,
    pub signature: Vec<u8>,
    pub evm_alias: Option<EvmAlias>,
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ExpanderError {
    /// The map carried a kind no transaction should present at this stage.
    #[error("unsupported signature kind {0:?} in signature map")]
    UnsupportedKind(SignatureKind),
}

fn check_supported(sig_map: &SignatureMap) -> Result<(), ExpanderError> {
    for pair in &sig_map.sig_pairs {
        match pair.kind {
            SignatureKind::Ed25519 | SignatureKind::EcdsaSecp256k1 => {},
            other => return Err(ExpanderError::UnsupportedKind(other)),
        }
    }
    Ok(())
}

fn kind_matches(key: &Key, kind: SignatureKind) -> bool {
    matches!(
        (key, kind),
        (Key::Ed25519(_), SignatureKind::Ed25519)
            | (Key::EcdsaSecp256k1(_), SignatureKind::EcdsaSecp256k1)
    )
}

fn pair_for<'a>(key: &Key, sig_map: &'a SignatureMap) -> Option<&'a SignaturePair> {
    let key_bytes = key.leaf_bytes()?;
    // The checker enforced pairwise prefix-disjointness, so at most one
    // entry can match.
    sig_map
        .sig_pairs
        .iter()
        .find(|pair| kind_matches(key, pair.kind) && key_bytes.starts_with(&pair.pub_key_prefix))
}

fn expanded(key: &Key, pair: &SignaturePair) -> ExpandedSignaturePair {
    let key_bytes = key.leaf_bytes().unwrap_or_default().to_vec();
    let evm_alias = match key {
        Key::EcdsaSecp256k1(bytes) => secp256k1::evm_alias(bytes).map(EvmAlias),
        _ => None,
    };
    ExpandedSignaturePair {
        key: key.clone(),
        key_bytes,
        signature: pair.signature.clone(),
        evm_alias,
    }
}

/// Matches the signing leaves of `keys` against the raw signature map.
///
/// Composite keys are flattened first; each distinct leaf is emitted at most
/// once. A leaf with no matching entry is silently skipped and will fail
/// verification deterministically for lack of a future.
pub fn expand_keys<'a>(
    keys: impl IntoIterator<Item = &'a Key>,
    sig_map: &SignatureMap,
) -> Result<Vec<ExpandedSignaturePair>, ExpanderError> {
    check_supported(sig_map)?;
    let mut seen: HashSet<&Key> = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        for leaf in key.signing_leaves() {
            if !seen.insert(leaf) {
                continue;
            }
            if let Some(pair) = pair_for(leaf, sig_map) {
                out.push(expanded(leaf, pair));
            }
        }
    }
    Ok(out)
}

/// Finds the ECDSA entry whose full public key derives `alias`, for hollow
/// accounts identified by alias alone. Only full keys can derive an alias,
/// so truncated prefixes never match here.
pub fn expand_alias(
    alias: &EvmAlias,
    sig_map: &SignatureMap,
) -> Result<Option<ExpandedSignaturePair>, ExpanderError> {
    check_supported(sig_map)?;
    for pair in &sig_map.sig_pairs {
        if pair.kind != SignatureKind::EcdsaSecp256k1 {
            continue;
        }
        if let Some(derived) = secp256k1::evm_alias(&pair.pub_key_prefix) {
            if &EvmAlias(derived) == alias {
                let key = Key::EcdsaSecp256k1(pair.pub_key_prefix.clone());
                return Ok(Some(ExpandedSignaturePair {
                    key_bytes: pair.pub_key_prefix.clone(),
                    signature: pair.signature.clone(),
                    evm_alias: Some(*alias),
                    key,
                }));
            }
        }
    }
    Ok(None)
}
