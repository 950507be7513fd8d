// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    account::{Account, AccountId, EvmAlias},
    timestamp::Timestamp,
};
use serde::{Deserialize, Serialize};

/// A pending network freeze, staged by the freeze handler.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FreezeSchedule {
    pub start_time: Timestamp,
}

/// Read access to the replicated ledger state. Implementations are
/// snapshot-consistent for the duration of a borrow and safe for concurrent
/// readers; the merkle-backed production store lives outside this crate.
pub trait LedgerReader {
    fn account(&self, id: &AccountId) -> Option<Account>;

    fn account_by_alias(&self, alias: &EvmAlias) -> Option<Account>;

    fn freeze_schedule(&self) -> Option<FreezeSchedule>;

    /// Reborrows `self` as a plain reader; implementors return `self`.
    fn as_reader(&self) -> &dyn LedgerReader;

    /// Resolves an account id of either shape, following the alias index
    /// when the id carries no number.
    fn resolve(&self, id: &AccountId) -> Option<Account> {
        match id.alias() {
            Some(alias) => self.account_by_alias(alias),
            None => self.account(id),
        }
    }
}

/// Write access to the replicated ledger state. Only the single-threaded
/// handle workflow holds one of these.
pub trait LedgerWriter: LedgerReader {
    fn put_account(&mut self, account: Account);

    fn set_freeze_schedule(&mut self, schedule: Option<FreezeSchedule>);
}
