// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use canopy_types::{account::AccountId, record::TransactionRecord, transaction::TransactionId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Recent transaction records, queryable by id and by payer. Fed as a
/// side-effect of every completed transaction; also the authority the handle
/// workflow consults to classify duplicates.
///
/// Per payer the history is bounded: once `max_queryable_by_account` records
/// are retained the eldest is evicted (and forgotten by id) before insertion.
#[derive(Debug)]
pub struct RecordCache {
    max_queryable_by_account: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<TransactionId, TransactionRecord>,
    by_payer: HashMap<AccountId, VecDeque<TransactionId>>,
}

impl RecordCache {
    pub fn new(max_queryable_by_account: usize) -> Self {
        Self {
            max_queryable_by_account: max_queryable_by_account.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn add(&self, record: TransactionRecord) {
        let mut inner = self.inner.lock();
        let tx_id = record.transaction_id;
        let evicted = {
            let history = inner.by_payer.entry(tx_id.payer).or_default();
            if history.contains(&tx_id) {
                None
            } else {
                let evicted = (history.len() == self.max_queryable_by_account)
                    .then(|| history.pop_front())
                    .flatten();
                history.push_back(tx_id);
                evicted
            }
        };
        if let Some(evicted) = evicted {
            inner.by_id.remove(&evicted);
        }
        inner.by_id.insert(tx_id, record);
    }

    pub fn get(&self, tx_id: &TransactionId) -> Option<TransactionRecord> {
        self.inner.lock().by_id.get(tx_id).cloned()
    }

    pub fn contains(&self, tx_id: &TransactionId) -> bool {
        self.inner.lock().by_id.contains_key(tx_id)
    }

    /// The retained records of `payer`, eldest first.
    pub fn records_for(&self, payer: &AccountId) -> Vec<TransactionRecord> {
        let inner = self.inner.lock();
        inner
            .by_payer
            .get(payer)
            .map(|history| {
                history
                    .iter()
                    .filter_map(|tx_id| inner.by_id.get(tx_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
