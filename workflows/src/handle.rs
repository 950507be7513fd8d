// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    block_record::BlockRecordManager,
    context::{HandleContext, StateScope},
    context_verifier::HandleContextVerifier,
    dedup::DeduplicationCache,
    dispatch::{HandlerOutcome, TransactionDispatcher},
    envelope::{ConsensusEvent, Round, TransactionEnvelope},
    expander::{ExpanderError, expand_keys},
    pre_handle::{PreHandleResult, PreHandleStatus, PreHandleWorkflow},
    record_cache::RecordCache,
    verifier::{SignatureVerifier, VerificationResults},
};
use arc_swap::ArcSwap;
use canopy_config::VersionedConfig;
use canopy_types::{
    account::AccountId,
    key::Key,
    record::{TransactionReceipt, TransactionRecord},
    response_code::ResponseCode,
    state::LedgerWriter,
    timestamp::Timestamp,
    transaction::{AccountAmount, TransactionId, TransactionInfo},
};
use std::sync::Arc;
use tracing::warn;

/// Stage two of the pipeline: strictly single-threaded, driven in consensus
/// order. The only place application state is ever mutated.
pub struct HandleWorkflow {
    pre_handle: Arc<PreHandleWorkflow>,
    verifier: SignatureVerifier,
    dedup_cache: Arc<DeduplicationCache>,
    record_cache: Arc<RecordCache>,
    dispatcher: Arc<TransactionDispatcher>,
    block_records: Arc<dyn BlockRecordManager>,
    config: Arc<ArcSwap<VersionedConfig>>,
}

impl HandleWorkflow {
    pub fn new(
        pre_handle: Arc<PreHandleWorkflow>,
        verifier: SignatureVerifier,
        dedup_cache: Arc<DeduplicationCache>,
        record_cache: Arc<RecordCache>,
        dispatcher: Arc<TransactionDispatcher>,
        block_records: Arc<dyn BlockRecordManager>,
        config: Arc<ArcSwap<VersionedConfig>>,
    ) -> Self {
        Self {
            pre_handle,
            verifier,
            dedup_cache,
            record_cache,
            dispatcher,
            block_records,
            config,
        }
    }

    /// Handles every transaction of `round` in consensus order, then closes
    /// the round out: the deduplication window is pruned and the block
    /// record manager sees the round boundary.
    pub fn handle_round(&self, state: &mut dyn LedgerWriter, round: &Round) {
        round.for_each_event_transaction(|event, envelope| {
            self.handle_transaction(state, event, envelope);
        });
        self.dedup_cache.purge(Timestamp::now());
        self.block_records.end_round(state.as_reader());
    }

    fn handle_transaction(
        &self,
        state: &mut dyn LedgerWriter,
        _event: &ConsensusEvent,
        envelope: &Arc<TransactionEnvelope>,
    ) {
        if envelope.is_system() {
            return;
        }
        let config = self.config.load_full();
        let consensus_now = envelope.consensus_timestamp();

        // Fetch the attached pre-handle result, or compute one right here:
        // the result may be missing (this node never pre-handled the
        // gossip), stale (config changed underneath it), or in a
        // re-runnable failure state. A replaced result keeps its
        // predecessor observable as the inner result.
        let result = match envelope.metadata() {
            Some(existing) if !existing.needs_rerun(config.version) => existing,
            prior => {
                let fresh = self.pre_handle.pre_handle_transaction(
                    state,
                    envelope.creator(),
                    envelope.raw_bytes(),
                    consensus_now,
                    &config,
                );
                let fresh = Arc::new(match prior {
                    Some(previous) => fresh.with_inner(previous),
                    None => fresh,
                });
                envelope.replace_metadata(fresh.clone());
                fresh
            },
        };

        self.block_records
            .start_user_transaction(consensus_now, state.as_reader());
        let record = self.execute(state, &config, consensus_now, envelope, &result);
        self.block_records
            .end_user_transaction(&record, state.as_reader());
        self.record_cache.add(record);
    }

    /// Classifies the pre-handle result and produces exactly one record.
    /// Nothing may escape: unexpected situations degrade to `Unknown`.
    fn execute(
        &self,
        state: &mut dyn LedgerWriter,
        config: &VersionedConfig,
        consensus_now: Timestamp,
        envelope: &TransactionEnvelope,
        result: &PreHandleResult,
    ) -> TransactionRecord {
        let tx_id = result
            .tx_info()
            .map(|info| info.tx_id)
            .unwrap_or_else(|| TransactionId::new(envelope.creator(), consensus_now));
        let memo = result
            .tx_info()
            .map(|info| info.body.memo.clone())
            .unwrap_or_default();

        match result.status() {
            PreHandleStatus::NodeDueDiligenceFailure => {
                // The submitting node pays the penalty; state is untouched.
                let creator = result.payer().unwrap_or_else(|| envelope.creator());
                let mut transfers = Vec::new();
                let fee = charge_fee(
                    state,
                    creator,
                    config.fees().node_penalty_fee,
                    config.fees().funding_account,
                    &mut transfers,
                );
                make_record(tx_id, result.response_code(), consensus_now, memo, fee, transfers)
            },
            PreHandleStatus::PreHandleFailure => {
                let payer = result.payer().unwrap_or(tx_id.payer);
                let mut transfers = Vec::new();
                let fee = charge_fee(
                    state,
                    payer,
                    config.fees().service_fee,
                    config.fees().funding_account,
                    &mut transfers,
                );
                make_record(tx_id, result.response_code(), consensus_now, memo, fee, transfers)
            },
            PreHandleStatus::UnknownFailure => {
                // Nobody is charged; the receipt just says so.
                make_record(tx_id, ResponseCode::Unknown, consensus_now, memo, 0, Vec::new())
            },
            PreHandleStatus::SoFarSoGood => {
                self.execute_user_transaction(state, config, consensus_now, result, tx_id, memo)
            },
        }
    }

    fn execute_user_transaction(
        &self,
        state: &mut dyn LedgerWriter,
        config: &VersionedConfig,
        consensus_now: Timestamp,
        result: &PreHandleResult,
        tx_id: TransactionId,
        memo: String,
    ) -> TransactionRecord {
        let Some(tx_info) = result.tx_info().cloned() else {
            // The so-far-so-good invariant guarantees this; degrade rather
            // than trust it with a panic on the handle thread.
            return make_record(tx_id, ResponseCode::Unknown, consensus_now, memo, 0, Vec::new());
        };
        let payer = result.payer().unwrap_or(tx_id.payer);
        let fees = config.fees();

        let fail = |state: &mut dyn LedgerWriter, code: ResponseCode| {
            let mut transfers = Vec::new();
            let fee = charge_fee(
                state,
                payer,
                fees.service_fee,
                fees.funding_account,
                &mut transfers,
            );
            make_record(tx_id, code, consensus_now, memo.clone(), fee, transfers)
        };

        // A transaction id only ever produces one record across the
        // deduplication window; later copies are charged and rejected.
        if self.record_cache.contains(&tx_id) {
            return fail(state, ResponseCode::DuplicateTransaction);
        }

        // Complete the verification map: any required key (or the payer
        // key) whose leaves were never seeded gets expanded and submitted
        // now, so the facade below has a future for everything it may need.
        let results = match self.complete_verification_results(result, &tx_info) {
            Ok(results) => results,
            Err(ExpanderError::UnsupportedKind(kind)) => {
                // Pre-handle accepted this map; a failure here is an
                // engine-internal inconsistency, not the payer's fault.
                warn!(?kind, "signature map failed late expansion");
                return make_record(
                    tx_id,
                    ResponseCode::Unknown,
                    consensus_now,
                    memo,
                    0,
                    Vec::new(),
                );
            },
        };
        let facade =
            HandleContextVerifier::new(results, config.workflow().verification_timeout());

        // Settle the payer's authorization first. A hollow payer is settled
        // through its alias, and the key that signed is remembered so the
        // account can be materialized below.
        let payer_account = state.resolve(&payer);
        let mut recovered_payer_key: Option<Key> = None;
        let payer_authorized = match result.payer_key() {
            Some(key) => facade.verification_for(key).passed,
            None => {
                let alias = payer_account
                    .as_ref()
                    .and_then(|account| account.alias)
                    .or_else(|| tx_id.payer.alias().copied());
                match alias {
                    Some(alias) => {
                        let verification = facade.verification_for_alias(&alias);
                        if verification.passed {
                            recovered_payer_key = Some(verification.key.clone());
                        }
                        verification.passed
                    },
                    None => false,
                }
            },
        };
        if !payer_authorized {
            return fail(state, ResponseCode::InvalidSignature);
        }

        // Every other required key must have settled passing before the
        // handler runs.
        for key in result.required_keys() {
            if !facade.verification_for(key).passed {
                return fail(state, ResponseCode::InvalidSignature);
            }
        }

        // Dispatch inside a transactional scope; mutations become visible
        // only on a clean outcome.
        let mut scope = StateScope::new(state);
        if let (Some(account), Some(recovered)) = (payer_account, recovered_payer_key) {
            if account.is_hollow() {
                let mut materialized = account;
                materialized.key = Some(recovered);
                scope.put_account(materialized);
            }
        }
        let mut ctx = HandleContext::new(payer, &tx_info.body, consensus_now, config, &facade, scope);
        match self.dispatcher.dispatch_handle(&mut ctx) {
            HandlerOutcome::Ok => {
                let (scope, mut transfers) = ctx.into_parts();
                scope.commit();
                let fee = charge_fee(
                    state,
                    payer,
                    fees.service_fee,
                    fees.funding_account,
                    &mut transfers,
                );
                make_record(tx_id, ResponseCode::Ok, consensus_now, memo, fee, transfers)
            },
            HandlerOutcome::Failed(code) => {
                drop(ctx);
                fail(state, code)
            },
            HandlerOutcome::Unknown => {
                drop(ctx);
                make_record(tx_id, ResponseCode::Unknown, consensus_now, memo, 0, Vec::new())
            },
        }
    }

    fn complete_verification_results(
        &self,
        result: &PreHandleResult,
        tx_info: &TransactionInfo,
    ) -> Result<VerificationResults, ExpanderError> {
        let mut results = result.verification_results().cloned().unwrap_or_default();
        let mut missing: Vec<&Key> = Vec::new();
        for key in result.required_keys().iter().chain(result.payer_key()) {
            for leaf in key.signing_leaves() {
                if !results.contains_key(leaf) && !missing.contains(&leaf) {
                    missing.push(leaf);
                }
            }
        }
        if !missing.is_empty() {
            let pairs = expand_keys(missing, &tx_info.sig_map)?;
            results.extend(self.verifier.verify(&tx_info.signed_bytes, &pairs));
        }
        Ok(results)
    }
}

/// Debits `from` (never below zero) and credits the funding account,
/// recording both movements. Returns what was actually collected.
fn charge_fee(
    state: &mut dyn LedgerWriter,
    from: AccountId,
    amount: u64,
    funding: AccountId,
    transfers: &mut Vec<AccountAmount>,
) -> u64 {
    if amount == 0 {
        return 0;
    }
    let Some(mut account) = state.resolve(&from) else {
        warn!(%from, "fee payer account vanished; nothing collected");
        return 0;
    };
    let charged = account.balance.min(amount);
    if charged == 0 {
        return 0;
    }
    account.balance -= charged;
    let from_id = account.id;
    state.put_account(account);
    transfers.push(AccountAmount {
        account: from_id,
        amount: -(charged as i64),
    });
    if let Some(mut funding_account) = state.resolve(&funding) {
        funding_account.balance = funding_account.balance.saturating_add(charged);
        let funding_id = funding_account.id;
        state.put_account(funding_account);
        transfers.push(AccountAmount {
            account: funding_id,
            amount: charged as i64,
        });
    }
    charged
}

fn make_record(
    tx_id: TransactionId,
    status: ResponseCode,
    consensus_timestamp: Timestamp,
    memo: String,
    transaction_fee: u64,
    transfers: Vec<AccountAmount>,
) -> TransactionRecord {
    TransactionRecord {
        transaction_id: tx_id,
        receipt: TransactionReceipt { status },
        consensus_timestamp,
        memo,
        transaction_fee,
        transfers,
    }
}
