// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use canopy_types::{timestamp::Timestamp, transaction::TransactionId};
use dashmap::DashMap;
use std::time::Duration;

/// Time-windowed set of transaction ids used to reject replays.
///
/// Written concurrently by pre-handle workers and by the handle thread when
/// it re-runs pre-handle; `add` is idempotent so the race is harmless.
/// Entries age out once their valid-start falls behind the configured
/// horizon; `purge` runs on round boundaries.
#[derive(Debug)]
pub struct DeduplicationCache {
    max_valid_duration: Duration,
    seen: DashMap<TransactionId, ()>,
}

impl DeduplicationCache {
    pub fn new(max_valid_duration: Duration) -> Self {
        Self {
            max_valid_duration,
            seen: DashMap::new(),
        }
    }

    pub fn add(&self, tx_id: TransactionId) {
        self.seen.insert(tx_id, ());
    }

    pub fn contains(&self, tx_id: &TransactionId) -> bool {
        self.seen.contains_key(tx_id)
    }

    /// Drops every id whose `valid_start + max_valid_duration` lies before
    /// `now`. Such an id can no longer be accepted by the checker, so
    /// forgetting it cannot re-open a replay window.
    pub fn purge(&self, now: Timestamp) {
        let horizon_secs = self.max_valid_duration.as_secs() as i64;
        self.seen
            .retain(|tx_id, _| tx_id.valid_start.saturating_add_secs(horizon_secs) >= now);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
