// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    checker::TransactionChecker,
    dedup::DeduplicationCache,
    dispatch::TransactionDispatcher,
    envelope::TransactionEnvelope,
    expander::{ExpanderError, expand_alias, expand_keys},
    verifier::{SignatureVerifier, VerificationResults},
};
use arc_swap::ArcSwap;
use canopy_config::VersionedConfig;
use canopy_types::{
    account::{AccountId, EvmAlias},
    key::Key,
    response_code::ResponseCode,
    state::LedgerReader,
    timestamp::Timestamp,
    transaction::{TransactionBody, TransactionInfo},
};
use rayon::prelude::*;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tracing::error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PreHandleStatus {
    /// Nothing failed before verification was launched; the handle phase
    /// settles the signatures and dispatches.
    SoFarSoGood,
    /// The submitting node gossiped something it should have rejected; the
    /// node, not the payer, is charged.
    NodeDueDiligenceFailure,
    /// The transaction failed its typed pre-checks; the payer is charged
    /// without the body executing.
    PreHandleFailure,
    /// Something unexpected broke. Nobody is charged and the handle phase
    /// re-runs pre-handle from scratch.
    UnknownFailure,
}

/// What one pre-handle attempt concluded. Attached to the envelope and
/// consumed (or replaced) by the handle workflow.
#[derive(Debug)]
pub struct PreHandleResult {
    status: PreHandleStatus,
    response_code: ResponseCode,
    payer: Option<AccountId>,
    payer_key: Option<Key>,
    tx_info: Option<Arc<TransactionInfo>>,
    required_keys: Vec<Key>,
    verification_results: Option<VerificationResults>,
    inner_result: Option<Arc<PreHandleResult>>,
    config_version: u64,
}

impl PreHandleResult {
    pub fn so_far_so_good(
        payer: AccountId,
        payer_key: Option<Key>,
        tx_info: Arc<TransactionInfo>,
        required_keys: Vec<Key>,
        verification_results: VerificationResults,
        config_version: u64,
    ) -> Self {
        Self {
            status: PreHandleStatus::SoFarSoGood,
            response_code: ResponseCode::Ok,
            payer: Some(payer),
            payer_key,
            tx_info: Some(tx_info),
            required_keys,
            verification_results: Some(verification_results),
            inner_result: None,
            config_version,
        }
    }

    pub fn node_due_diligence(
        creator: AccountId,
        response_code: ResponseCode,
        tx_info: Option<Arc<TransactionInfo>>,
        config_version: u64,
    ) -> Self {
        Self {
            status: PreHandleStatus::NodeDueDiligenceFailure,
            response_code,
            payer: Some(creator),
            payer_key: None,
            tx_info,
            required_keys: Vec::new(),
            verification_results: None,
            inner_result: None,
            config_version,
        }
    }

    pub fn pre_handle_failure(
        payer: AccountId,
        response_code: ResponseCode,
        tx_info: Arc<TransactionInfo>,
        verification_results: VerificationResults,
        config_version: u64,
    ) -> Self {
        Self {
            status: PreHandleStatus::PreHandleFailure,
            response_code,
            payer: Some(payer),
            payer_key: None,
            tx_info: Some(tx_info),
            required_keys: Vec::new(),
            verification_results: Some(verification_results),
            inner_result: None,
            config_version,
        }
    }

    pub fn unknown_failure() -> Self {
        Self {
            status: PreHandleStatus::UnknownFailure,
            response_code: ResponseCode::Unknown,
            payer: None,
            payer_key: None,
            tx_info: None,
            required_keys: Vec::new(),
            verification_results: None,
            inner_result: None,
            config_version: 0,
        }
    }

    /// Chains the result this one replaced, keeping the earlier failure
    /// observable to anyone walking the envelope's history.
    pub fn with_inner(mut self, inner: Arc<PreHandleResult>) -> Self {
        self.inner_result = Some(inner);
        self
    }

    pub fn status(&self) -> PreHandleStatus {
        self.status
    }

    pub fn response_code(&self) -> ResponseCode {
        self.response_code
    }

    pub fn payer(&self) -> Option<AccountId> {
        self.payer
    }

    pub fn payer_key(&self) -> Option<&Key> {
        self.payer_key.as_ref()
    }

    pub fn tx_info(&self) -> Option<&Arc<TransactionInfo>> {
        self.tx_info.as_ref()
    }

    pub fn required_keys(&self) -> &[Key] {
        &self.required_keys
    }

    pub fn verification_results(&self) -> Option<&VerificationResults> {
        self.verification_results.as_ref()
    }

    pub fn inner_result(&self) -> Option<&Arc<PreHandleResult>> {
        self.inner_result.as_ref()
    }

    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    /// Whether the handle thread must discard this result and pre-handle the
    /// transaction again: re-runnable failure states, and anything computed
    /// under an outdated configuration.
    pub fn needs_rerun(&self, current_config_version: u64) -> bool {
        matches!(
            self.status,
            PreHandleStatus::PreHandleFailure | PreHandleStatus::UnknownFailure
        ) || self.config_version != current_config_version
    }
}

/// What a typed handler's pre-handle sees: read-only stores plus recorders
/// for the signatures the transaction will need beyond the payer's.
pub struct PreHandleContext<'a> {
    store: &'a dyn LedgerReader,
    payer: AccountId,
    body: &'a TransactionBody,
    required_keys: Vec<Key>,
    optional_keys: Vec<Key>,
    hollow_aliases: Vec<EvmAlias>,
}

impl<'a> PreHandleContext<'a> {
    pub fn new(store: &'a dyn LedgerReader, payer: AccountId, body: &'a TransactionBody) -> Self {
        Self {
            store,
            payer,
            body,
            required_keys: Vec::new(),
            optional_keys: Vec::new(),
            hollow_aliases: Vec::new(),
        }
    }

    pub fn store(&self) -> &dyn LedgerReader {
        self.store
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    pub fn body(&self) -> &TransactionBody {
        self.body
    }

    /// Records a key that must have a passing verification for the
    /// transaction to execute.
    pub fn require_key(&mut self, key: Key) {
        if !self.required_keys.contains(&key) {
            self.required_keys.push(key);
        }
    }

    /// Records a key to verify opportunistically; its failure does not block
    /// execution, but the handler can ask for the outcome.
    pub fn optional_key(&mut self, key: Key) {
        if !self.optional_keys.contains(&key) {
            self.optional_keys.push(key);
        }
    }

    /// Records that a hollow account must have authorized this transaction
    /// through a signature whose recovered alias matches.
    pub fn require_signature_for_hollow_account(&mut self, alias: EvmAlias) {
        if !self.hollow_aliases.contains(&alias) {
            self.hollow_aliases.push(alias);
        }
    }

    fn into_requirements(self) -> (Vec<Key>, Vec<Key>, Vec<EvmAlias>) {
        (self.required_keys, self.optional_keys, self.hollow_aliases)
    }
}

/// Stage one of the pipeline. Runs off consensus order, in parallel, and
/// never mutates application state; its entire output is the
/// [`PreHandleResult`] published onto each envelope.
pub struct PreHandleWorkflow {
    checker: TransactionChecker,
    verifier: SignatureVerifier,
    dedup_cache: Arc<DeduplicationCache>,
    dispatcher: Arc<TransactionDispatcher>,
    config: Arc<ArcSwap<VersionedConfig>>,
}

impl PreHandleWorkflow {
    pub fn new(
        verifier: SignatureVerifier,
        dedup_cache: Arc<DeduplicationCache>,
        dispatcher: Arc<TransactionDispatcher>,
        config: Arc<ArcSwap<VersionedConfig>>,
    ) -> Self {
        Self {
            checker: TransactionChecker,
            verifier,
            dedup_cache,
            dispatcher,
            config,
        }
    }

    /// Fans a batch of gossiped envelopes across the worker pool. Envelopes
    /// are independent; no ordering is promised (consensus re-orders them
    /// anyway).
    pub fn pre_handle_all<S>(&self, store: &S, envelopes: &[Arc<TransactionEnvelope>])
    where
        S: LedgerReader + Sync + ?Sized,
    {
        let now = Timestamp::now();
        envelopes
            .par_iter()
            .for_each(|envelope| self.pre_handle_envelope(store, envelope, now));
    }

    pub fn pre_handle_envelope<S>(&self, store: &S, envelope: &TransactionEnvelope, now: Timestamp)
    where
        S: LedgerReader + ?Sized,
    {
        if envelope.is_system() {
            return;
        }
        let config = self.config.load_full();
        let result =
            self.pre_handle_transaction(store, envelope.creator(), envelope.raw_bytes(), now, &config);
        // First publication wins; a racing worker's duplicate is dropped and
        // only the handle thread ever replaces a published result.
        envelope.set_metadata_if_absent(Arc::new(result));
    }

    /// Runs the whole per-transaction pre-handle procedure. Total: every
    /// failure, including a panic in a typed handler, is folded into the
    /// returned result.
    pub fn pre_handle_transaction<S>(
        &self,
        store: &S,
        creator: AccountId,
        raw_bytes: &[u8],
        now: Timestamp,
        config: &VersionedConfig,
    ) -> PreHandleResult
    where
        S: LedgerReader + ?Sized,
    {
        match catch_unwind(AssertUnwindSafe(|| {
            self.pre_handle_inner(store, creator, raw_bytes, now, config)
        })) {
            Ok(result) => result,
            Err(_) => {
                error!("pre-handle panicked; transaction will be retried at handle time");
                PreHandleResult::unknown_failure()
            },
        }
    }

    fn pre_handle_inner<S>(
        &self,
        store: &S,
        creator: AccountId,
        raw_bytes: &[u8],
        now: Timestamp,
        config: &VersionedConfig,
    ) -> PreHandleResult
    where
        S: LedgerReader + ?Sized,
    {
        let version = config.version;

        // 1. Parse and statically check. The creator vouched for this
        // payload, so a failure here is on the node.
        let tx_info = match self.checker.parse_and_check(config.workflow(), raw_bytes, now) {
            Ok(info) => Arc::new(info),
            Err(failure) => {
                return PreHandleResult::node_due_diligence(creator, failure.code, None, version);
            },
        };

        // 2. Every well-formed id enters the deduplication window, whatever
        // happens to the transaction afterwards.
        self.dedup_cache.add(tx_info.tx_id);

        // 3. Resolve the payer.
        let payer_account = match store.resolve(&tx_info.payer()) {
            Some(account) if account.deleted => {
                return PreHandleResult::node_due_diligence(
                    creator,
                    ResponseCode::AccountDeleted,
                    Some(tx_info),
                    version,
                );
            },
            Some(account) => account,
            None => {
                return PreHandleResult::node_due_diligence(
                    creator,
                    ResponseCode::PayerAccountNotFound,
                    Some(tx_info),
                    version,
                );
            },
        };
        let payer = payer_account.id;
        let payer_key = payer_account.key.clone();

        // 4. Launch verification of the payer's signature (or, for a hollow
        // payer, of the signature whose alias matches).
        let mut results = VerificationResults::new();
        let seeded = match (&payer_key, payer_account.alias) {
            (Some(key), _) => expand_keys([key], &tx_info.sig_map),
            (None, Some(alias)) => {
                expand_alias(&alias, &tx_info.sig_map).map(|pair| pair.into_iter().collect())
            },
            (None, None) => Ok(Vec::new()),
        };
        match seeded {
            Ok(pairs) => results.extend(self.verifier.verify(&tx_info.signed_bytes, &pairs)),
            Err(failure) => {
                return Self::expander_failure(creator, failure, tx_info, version);
            },
        }

        // 5. Let the typed handler declare what else must have signed.
        let mut ctx = PreHandleContext::new(store.as_reader(), payer, &tx_info.body);
        if let Err(failure) = self.dispatcher.dispatch_pre_handle(&mut ctx) {
            return PreHandleResult::pre_handle_failure(
                payer,
                failure.code,
                tx_info,
                results,
                version,
            );
        }
        let (mut required_keys, optional_keys, hollow_aliases) = ctx.into_requirements();
        if let Some(key) = &payer_key {
            required_keys.retain(|required| required != key);
        }

        // 6. Expand and launch verification for the collected requirements.
        let to_expand = required_keys.iter().chain(optional_keys.iter());
        match expand_keys(to_expand, &tx_info.sig_map) {
            Ok(mut pairs) => {
                pairs.retain(|pair| !results.contains_key(&pair.key));
                results.extend(self.verifier.verify(&tx_info.signed_bytes, &pairs));
            },
            Err(failure) => {
                return Self::expander_failure(creator, failure, tx_info, version);
            },
        }
        for alias in hollow_aliases {
            if results.values().any(|future| future.evm_alias() == Some(&alias)) {
                continue;
            }
            match expand_alias(&alias, &tx_info.sig_map) {
                Ok(Some(pair)) if !results.contains_key(&pair.key) => {
                    results.extend(self.verifier.verify(&tx_info.signed_bytes, &[pair]));
                },
                Ok(_) => {},
                Err(failure) => {
                    return Self::expander_failure(creator, failure, tx_info, version);
                },
            }
        }

        PreHandleResult::so_far_so_good(payer, payer_key, tx_info, required_keys, results, version)
    }

    /// An unsupported kind in the signature map should have been rejected by
    /// the submitting node before gossip, so it is charged to the node.
    fn expander_failure(
        creator: AccountId,
        failure: ExpanderError,
        tx_info: Arc<TransactionInfo>,
        version: u64,
    ) -> PreHandleResult {
        let ExpanderError::UnsupportedKind(kind) = failure;
        error!(?kind, "signature map carried an unsupported signature kind");
        PreHandleResult::node_due_diligence(
            creator,
            ResponseCode::InvalidTransaction,
            Some(tx_info),
            version,
        )
    }
}
