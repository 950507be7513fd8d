// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Domain status codes surfaced in receipts and records.
///
/// `Ok` and `Unknown` are the two codes with engine-level meaning; the rest
/// classify the specific pre-check or handler failure for the record stream.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ResponseCode {
    Ok,
    Unknown,
    InvalidTransaction,
    InvalidTransactionId,
    TransactionOversize,
    TransactionExpired,
    InvalidTransactionStart,
    InvalidTransactionDuration,
    MemoTooLong,
    KeyPrefixMismatch,
    DuplicateTransaction,
    InvalidPayerAccountId,
    PayerAccountNotFound,
    InsufficientPayerBalance,
    InvalidSignature,
    InvalidAccountAmounts,
    InvalidTransferAccountId,
    InsufficientAccountBalance,
    AccountDeleted,
    InvalidFreezeTransactionBody,
    FreezeStartTimeMustBeFuture,
}

impl ResponseCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}
