// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    response_code::ResponseCode,
    timestamp::Timestamp,
    transaction::{AccountAmount, TransactionId},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransactionReceipt {
    pub status: ResponseCode,
}

/// The externally visible outcome of one handled transaction. Every
/// transaction that reaches the handle workflow emits exactly one record,
/// successful or not, and all honest nodes emit byte-identical ones.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub receipt: TransactionReceipt,
    pub consensus_timestamp: Timestamp,
    pub memo: String,
    /// Total fee collected for this transaction, in tinybars.
    pub transaction_fee: u64,
    /// Net balance adjustments applied, fee movements included.
    pub transfers: Vec<AccountAmount>,
}

impl TransactionRecord {
    pub fn status(&self) -> ResponseCode {
        self.receipt.status
    }
}
