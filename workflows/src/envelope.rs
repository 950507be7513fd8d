// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::pre_handle::PreHandleResult;
use arc_swap::ArcSwapOption;
use canopy_types::{account::AccountId, timestamp::Timestamp};
use std::sync::Arc;

/// The opaque carrier the gossip layer delivers transactions in. The
/// `metadata` slot is the hand-off point between the two workflow stages:
/// pre-handle workers publish into it (first writer wins), the handle thread
/// reads it with acquire semantics and is the only one allowed to replace a
/// published result.
#[derive(Debug)]
pub struct TransactionEnvelope {
    raw_bytes: Vec<u8>,
    consensus_timestamp: Timestamp,
    is_system: bool,
    creator: AccountId,
    metadata: ArcSwapOption<PreHandleResult>,
}

impl TransactionEnvelope {
    pub fn user(raw_bytes: Vec<u8>, creator: AccountId, consensus_timestamp: Timestamp) -> Self {
        Self {
            raw_bytes,
            consensus_timestamp,
            is_system: false,
            creator,
            metadata: ArcSwapOption::empty(),
        }
    }

    /// A platform-internal transaction; both workflows skip it untouched.
    pub fn system(raw_bytes: Vec<u8>, creator: AccountId, consensus_timestamp: Timestamp) -> Self {
        Self {
            is_system: true,
            ..Self::user(raw_bytes, creator, consensus_timestamp)
        }
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn consensus_timestamp(&self) -> Timestamp {
        self.consensus_timestamp
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// The account of the node that submitted this envelope to gossip; the
    /// account charged when the transaction fails due diligence.
    pub fn creator(&self) -> AccountId {
        self.creator
    }

    pub fn metadata(&self) -> Option<Arc<PreHandleResult>> {
        self.metadata.load_full()
    }

    /// Publishes a pre-handle result unless one is already present. Racing
    /// workers settle here: exactly one wins, the rest drop their result.
    pub fn set_metadata_if_absent(&self, result: Arc<PreHandleResult>) -> bool {
        let previous = self
            .metadata
            .compare_and_swap(&None::<Arc<PreHandleResult>>, Some(result));
        previous.is_none()
    }

    /// Unconditional replacement; reserved to the handle thread, which is
    /// the only consumer and re-runs pre-handle for stale results.
    pub fn replace_metadata(&self, result: Arc<PreHandleResult>) {
        self.metadata.store(Some(result));
    }
}

/// One gossip event inside a round, carrying the envelopes its creator
/// submitted.
#[derive(Debug)]
pub struct ConsensusEvent {
    creator: AccountId,
    transactions: Vec<Arc<TransactionEnvelope>>,
}

impl ConsensusEvent {
    pub fn new(creator: AccountId, transactions: Vec<Arc<TransactionEnvelope>>) -> Self {
        Self {
            creator,
            transactions,
        }
    }

    pub fn creator(&self) -> AccountId {
        self.creator
    }

    pub fn transactions(&self) -> &[Arc<TransactionEnvelope>] {
        &self.transactions
    }
}

/// A batch of events assigned one consensus order by the gossip layer.
#[derive(Debug)]
pub struct Round {
    number: u64,
    events: Vec<ConsensusEvent>,
}

impl Round {
    pub fn new(number: u64, events: Vec<ConsensusEvent>) -> Self {
        Self { number, events }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn events(&self) -> &[ConsensusEvent] {
        &self.events
    }

    /// Visits every transaction of the round in consensus order.
    pub fn for_each_event_transaction(
        &self,
        mut visit: impl FnMut(&ConsensusEvent, &Arc<TransactionEnvelope>),
    ) {
        for event in &self.events {
            for transaction in event.transactions() {
                visit(event, transaction);
            }
        }
    }

    /// All envelopes of the round, in consensus order.
    pub fn transactions(&self) -> impl Iterator<Item = &Arc<TransactionEnvelope>> {
        self.events.iter().flat_map(|event| event.transactions().iter())
    }
}
