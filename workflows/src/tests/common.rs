// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: a fully wired engine over an in-memory ledger, seeded
//! deterministic signers, and builders for signed envelopes.

use crate::{
    block_record::RecordStreamCollector,
    dedup::DeduplicationCache,
    dispatch::TransactionDispatcher,
    envelope::{ConsensusEvent, Round, TransactionEnvelope},
    handle::HandleWorkflow,
    pre_handle::PreHandleWorkflow,
    record_cache::RecordCache,
    test_utils::InMemoryLedger,
    verifier::SignatureVerifier,
};
use arc_swap::ArcSwap;
use canopy_config::{NodeConfig, VersionedConfig};
use canopy_crypto::{
    engine::{CryptoEngine, ImmediateCryptoEngine},
    test_utils::{EcdsaSigner, Ed25519Signer},
};
use canopy_types::{
    account::{Account, AccountId, EvmAlias},
    key::Key,
    timestamp::Timestamp,
    transaction::{
        AccountAmount, FreezeBody, SignatureKind, SignatureMap, SignaturePair, SignedTransaction,
        TransactionBody, TransactionId, TransactionPayload, TransferList,
    },
};
use std::sync::Arc;

pub const NODE: u64 = 3;
pub const FUNDING: u64 = 98;
pub const ALICE: u64 = 1001;
pub const ERIN: u64 = 1002;
pub const CAROL_HOLLOW: u64 = 1200;
pub const FRANK_ABSENT: u64 = 1111;

pub fn account_id(num: u64) -> AccountId {
    AccountId::new(0, 0, num)
}

pub fn node_signer() -> Ed25519Signer {
    Ed25519Signer::from_seed([0x03; 32])
}

pub fn alice_signer() -> Ed25519Signer {
    Ed25519Signer::from_seed([0xA1; 32])
}

pub fn erin_signer() -> Ed25519Signer {
    Ed25519Signer::from_seed([0xE2; 32])
}

pub fn carol_signer() -> EcdsaSigner {
    EcdsaSigner::from_seed([0xCC; 32])
}

pub fn carol_alias() -> EvmAlias {
    EvmAlias(carol_signer().alias())
}

pub fn ed_key(signer: &Ed25519Signer) -> Key {
    Key::Ed25519(signer.public_key())
}

/// The standard cast: a submitting node, the fee collector, two keyed
/// users, and one hollow account known only by its alias.
pub fn seeded_ledger() -> InMemoryLedger {
    InMemoryLedger::with_accounts([
        Account::new(account_id(NODE), ed_key(&node_signer()), 10_000),
        Account::new(account_id(FUNDING), ed_key(&node_signer()), 0),
        Account::new(account_id(ALICE), ed_key(&alice_signer()), 100_000),
        Account::new(account_id(ERIN), ed_key(&erin_signer()), 5_000),
        Account::hollow(account_id(CAROL_HOLLOW), carol_alias(), 50_000),
    ])
}

pub struct TestHarness {
    pub ledger: InMemoryLedger,
    pub pre_handle: Arc<PreHandleWorkflow>,
    pub handle: HandleWorkflow,
    pub dedup: Arc<DeduplicationCache>,
    pub record_cache: Arc<RecordCache>,
    pub stream: Arc<RecordStreamCollector>,
    pub config: Arc<ArcSwap<VersionedConfig>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_engine(Arc::new(ImmediateCryptoEngine))
    }

    pub fn with_engine(engine: Arc<dyn CryptoEngine>) -> Self {
        Self::with_parts(engine, NodeConfig::default())
    }

    pub fn with_node_config(node_config: NodeConfig) -> Self {
        Self::with_parts(Arc::new(ImmediateCryptoEngine), node_config)
    }

    pub fn with_parts(engine: Arc<dyn CryptoEngine>, node_config: NodeConfig) -> Self {
        let config = Arc::new(ArcSwap::from_pointee(VersionedConfig::new(1, node_config)));
        let snapshot = config.load_full();
        let dedup = Arc::new(DeduplicationCache::new(snapshot.workflow().max_valid_duration()));
        let record_cache = Arc::new(RecordCache::new(
            snapshot.workflow().records_max_queryable_by_account,
        ));
        let dispatcher = Arc::new(TransactionDispatcher::new(snapshot.freeze().clone()));
        let verifier = SignatureVerifier::new(engine);
        let pre_handle = Arc::new(PreHandleWorkflow::new(
            verifier.clone(),
            dedup.clone(),
            dispatcher.clone(),
            config.clone(),
        ));
        let stream = Arc::new(RecordStreamCollector::new());
        let handle = HandleWorkflow::new(
            pre_handle.clone(),
            verifier,
            dedup.clone(),
            record_cache.clone(),
            dispatcher,
            stream.clone(),
            config.clone(),
        );
        Self {
            ledger: seeded_ledger(),
            pre_handle,
            handle,
            dedup,
            record_cache,
            stream,
            config,
        }
    }

    /// Publishes a new configuration snapshot with a bumped version.
    pub fn bump_config(&self, node_config: NodeConfig) {
        let version = self.config.load().version + 1;
        self.config
            .store(Arc::new(VersionedConfig::new(version, node_config)));
    }

    pub fn balance(&self, num: u64) -> u64 {
        self.ledger.balance(&account_id(num)).unwrap_or_default()
    }
}

pub fn transfer_payload(amounts: &[(AccountId, i64)]) -> TransactionPayload {
    TransactionPayload::CryptoTransfer(TransferList {
        account_amounts: amounts
            .iter()
            .map(|(account, amount)| AccountAmount {
                account: *account,
                amount: *amount,
            })
            .collect(),
    })
}

pub fn body_with(
    payer: AccountId,
    valid_start: Timestamp,
    payload: TransactionPayload,
) -> TransactionBody {
    TransactionBody {
        transaction_id: Some(TransactionId::new(payer, valid_start)),
        node_account_id: account_id(NODE),
        valid_duration_secs: 120,
        memo: String::new(),
        payload,
    }
}

pub fn transfer_body(
    payer: AccountId,
    valid_start: Timestamp,
    amounts: &[(AccountId, i64)],
) -> TransactionBody {
    body_with(payer, valid_start, transfer_payload(amounts))
}

pub fn freeze_tx_body(payer: AccountId, valid_start: Timestamp, freeze: FreezeBody) -> TransactionBody {
    body_with(payer, valid_start, TransactionPayload::Freeze(freeze))
}

pub fn ed_pair(signer: &Ed25519Signer, body_bytes: &[u8]) -> SignaturePair {
    SignaturePair {
        pub_key_prefix: signer.public_key(),
        signature: signer.sign(body_bytes),
        kind: SignatureKind::Ed25519,
    }
}

pub fn ecdsa_pair(signer: &EcdsaSigner, body_bytes: &[u8]) -> SignaturePair {
    SignaturePair {
        pub_key_prefix: signer.public_key_compressed(),
        signature: signer.sign_payload(body_bytes),
        kind: SignatureKind::EcdsaSecp256k1,
    }
}

/// A pair that matches `signer`'s key but carries a signature over other
/// bytes, so verification deterministically fails.
pub fn bad_ed_pair(signer: &Ed25519Signer) -> SignaturePair {
    SignaturePair {
        pub_key_prefix: signer.public_key(),
        signature: signer.sign(b"something else entirely"),
        kind: SignatureKind::Ed25519,
    }
}

pub fn raw_with_pairs(
    body: &TransactionBody,
    pairs: impl FnOnce(&[u8]) -> Vec<SignaturePair>,
) -> Vec<u8> {
    let body_bytes = bcs::to_bytes(body).expect("body encodes");
    let sig_map = SignatureMap::new(pairs(&body_bytes));
    SignedTransaction {
        body_bytes,
        sig_map,
    }
    .to_bytes()
    .expect("envelope encodes")
}

pub fn signed_by_ed(body: &TransactionBody, signers: &[&Ed25519Signer]) -> Vec<u8> {
    raw_with_pairs(body, |body_bytes| {
        signers.iter().map(|signer| ed_pair(signer, body_bytes)).collect()
    })
}

pub fn signed_by_carol(body: &TransactionBody) -> Vec<u8> {
    raw_with_pairs(body, |body_bytes| vec![ecdsa_pair(&carol_signer(), body_bytes)])
}

pub fn envelope_of(raw: Vec<u8>, consensus_timestamp: Timestamp) -> Arc<TransactionEnvelope> {
    Arc::new(TransactionEnvelope::user(
        raw,
        account_id(NODE),
        consensus_timestamp,
    ))
}

pub fn round_of(envelopes: Vec<Arc<TransactionEnvelope>>) -> Round {
    Round::new(1, vec![ConsensusEvent::new(account_id(NODE), envelopes)])
}
