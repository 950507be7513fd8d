// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the external collaborators, shared by the test
//! suites of this crate and its dependents.

use canopy_types::{
    account::{Account, AccountId, EvmAlias},
    state::{FreezeSchedule, LedgerReader, LedgerWriter},
};
use std::collections::HashMap;

/// A plain map-backed ledger. The production store is merkle-backed and
/// lives outside the engine; everything the workflows need from it is the
/// `LedgerReader`/`LedgerWriter` surface this type implements.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<AccountId, Account>,
    freeze: Option<FreezeSchedule>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut ledger = Self::new();
        for account in accounts {
            ledger.put_account(account);
        }
        ledger
    }

    pub fn balance(&self, id: &AccountId) -> Option<u64> {
        self.resolve(id).map(|account| account.balance)
    }
}

impl LedgerReader for InMemoryLedger {
    fn account(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id).cloned()
    }

    fn account_by_alias(&self, alias: &EvmAlias) -> Option<Account> {
        self.accounts
            .values()
            .find(|account| account.alias.as_ref() == Some(alias))
            .cloned()
    }

    fn freeze_schedule(&self) -> Option<FreezeSchedule> {
        self.freeze
    }

    fn as_reader(&self) -> &dyn LedgerReader {
        self
    }
}

impl LedgerWriter for InMemoryLedger {
    fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    fn set_freeze_schedule(&mut self, schedule: Option<FreezeSchedule>) {
        self.freeze = schedule;
    }
}
