// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{context_verifier::HandleContextVerifier, verifier::SignatureVerification};
use canopy_config::VersionedConfig;
use canopy_types::{
    account::{Account, AccountId, EvmAlias},
    key::Key,
    state::{FreezeSchedule, LedgerReader, LedgerWriter},
    timestamp::Timestamp,
    transaction::{AccountAmount, TransactionBody},
};
use std::collections::HashMap;

/// A transactional overlay on the writable ledger. Handler mutations land in
/// the overlay; the engine commits them to the base store only when dispatch
/// completes cleanly, and simply drops the scope otherwise. Reads see the
/// overlay first, so a handler observes its own writes.
pub struct StateScope<'a> {
    base: &'a mut dyn LedgerWriter,
    staged_accounts: HashMap<AccountId, Account>,
    staged_freeze: Option<Option<FreezeSchedule>>,
}

impl<'a> StateScope<'a> {
    pub fn new(base: &'a mut dyn LedgerWriter) -> Self {
        Self {
            base,
            staged_accounts: HashMap::new(),
            staged_freeze: None,
        }
    }

    /// Applies every staged write to the base store.
    pub fn commit(self) {
        for (_, account) in self.staged_accounts {
            self.base.put_account(account);
        }
        if let Some(schedule) = self.staged_freeze {
            self.base.set_freeze_schedule(schedule);
        }
    }
}

impl LedgerReader for StateScope<'_> {
    fn account(&self, id: &AccountId) -> Option<Account> {
        self.staged_accounts
            .get(id)
            .cloned()
            .or_else(|| self.base.account(id))
    }

    fn account_by_alias(&self, alias: &EvmAlias) -> Option<Account> {
        self.staged_accounts
            .values()
            .find(|account| account.alias.as_ref() == Some(alias))
            .cloned()
            .or_else(|| self.base.account_by_alias(alias))
    }

    fn freeze_schedule(&self) -> Option<FreezeSchedule> {
        match &self.staged_freeze {
            Some(staged) => *staged,
            None => self.base.freeze_schedule(),
        }
    }

    fn as_reader(&self) -> &dyn LedgerReader {
        self
    }
}

impl LedgerWriter for StateScope<'_> {
    fn put_account(&mut self, account: Account) {
        self.staged_accounts.insert(account.id, account);
    }

    fn set_freeze_schedule(&mut self, schedule: Option<FreezeSchedule>) {
        self.staged_freeze = Some(schedule);
    }
}

/// Everything a typed handler sees while executing in consensus order:
/// the parsed body, the transactional state scope, the signature
/// verification façade, and a ledger of the balance movements it performed
/// (folded into the emitted record).
pub struct HandleContext<'a> {
    payer: AccountId,
    body: &'a TransactionBody,
    consensus_now: Timestamp,
    config: &'a VersionedConfig,
    verifier: &'a HandleContextVerifier,
    scope: StateScope<'a>,
    transfers: Vec<AccountAmount>,
}

impl<'a> HandleContext<'a> {
    pub fn new(
        payer: AccountId,
        body: &'a TransactionBody,
        consensus_now: Timestamp,
        config: &'a VersionedConfig,
        verifier: &'a HandleContextVerifier,
        scope: StateScope<'a>,
    ) -> Self {
        Self {
            payer,
            body,
            consensus_now,
            config,
            verifier,
            scope,
            transfers: Vec::new(),
        }
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    pub fn body(&self) -> &TransactionBody {
        self.body
    }

    pub fn consensus_now(&self) -> Timestamp {
        self.consensus_now
    }

    pub fn config(&self) -> &VersionedConfig {
        self.config
    }

    pub fn verification_for(&self, key: &Key) -> SignatureVerification {
        self.verifier.verification_for(key)
    }

    pub fn verification_for_alias(&self, alias: &EvmAlias) -> SignatureVerification {
        self.verifier.verification_for_alias(alias)
    }

    pub fn account(&self, id: &AccountId) -> Option<Account> {
        self.scope.resolve(id)
    }

    pub fn put_account(&mut self, account: Account) {
        self.scope.put_account(account);
    }

    pub fn freeze_schedule(&self) -> Option<FreezeSchedule> {
        self.scope.freeze_schedule()
    }

    pub fn set_freeze_schedule(&mut self, schedule: Option<FreezeSchedule>) {
        self.scope.set_freeze_schedule(schedule);
    }

    /// Registers a balance movement for the record's transfer list. The
    /// handler still performs the actual `put_account`.
    pub fn note_transfer(&mut self, account: AccountId, amount: i64) {
        self.transfers.push(AccountAmount { account, amount });
    }

    /// Tears the context down into its scope and noted transfers; the
    /// engine commits or discards from there.
    pub fn into_parts(self) -> (StateScope<'a>, Vec<AccountAmount>) {
        (self.scope, self.transfers)
    }
}
