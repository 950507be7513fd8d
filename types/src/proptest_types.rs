// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

//! Proptest strategies shared by property tests across the workspace.

use crate::{
    account::AccountId,
    key::Key,
    timestamp::Timestamp,
    transaction::TransactionId,
};
use proptest::{collection::vec, prelude::*};

pub fn arb_ed25519_key() -> impl Strategy<Value = Key> {
    vec(any::<u8>(), 32).prop_map(Key::Ed25519)
}

pub fn arb_ecdsa_key() -> impl Strategy<Value = Key> {
    vec(any::<u8>(), 33).prop_map(Key::EcdsaSecp256k1)
}

pub fn arb_signing_leaf() -> impl Strategy<Value = Key> {
    prop_oneof![arb_ed25519_key(), arb_ecdsa_key()]
}

/// A key tree of bounded depth mixing lists and thresholds over signing
/// leaves. Thresholds are intentionally unclamped so consumers exercise the
/// clamping rule.
pub fn arb_key_tree() -> impl Strategy<Value = Key> {
    arb_signing_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 1..4).prop_map(Key::KeyList),
            (vec(inner, 1..4), 0u32..6).prop_map(|(keys, threshold)| Key::Threshold {
                threshold,
                keys
            }),
        ]
    })
}

pub fn arb_account_id() -> impl Strategy<Value = AccountId> {
    (1u64..100_000).prop_map(|num| AccountId::new(0, 0, num))
}

pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..2_000_000_000, 0u32..1_000_000_000)
        .prop_map(|(seconds, nanos)| Timestamp::new(seconds, nanos))
}

pub fn arb_transaction_id() -> impl Strategy<Value = TransactionId> {
    (arb_account_id(), arb_timestamp(), 0u32..3).prop_map(|(payer, valid_start, nonce)| {
        TransactionId {
            payer,
            valid_start,
            nonce,
        }
    })
}
