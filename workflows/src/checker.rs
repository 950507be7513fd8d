// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::error::PreCheckError;
use canopy_config::WorkflowConfig;
use canopy_types::{
    response_code::ResponseCode,
    timestamp::Timestamp,
    transaction::{SignatureMap, SignedTransaction, TransactionBody, TransactionInfo},
};

/// Stateless syntactic/semantic pre-flight over the raw gossip payload.
/// Everything here is checkable without touching state, so both workflow
/// stages can run it: pre-handle against the wall clock, the handle thread
/// (on re-runs) against consensus time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionChecker;

impl TransactionChecker {
    pub fn parse_and_check(
        &self,
        config: &WorkflowConfig,
        raw_bytes: &[u8],
        now: Timestamp,
    ) -> Result<TransactionInfo, PreCheckError> {
        if raw_bytes.len() > config.max_transaction_bytes {
            return Err(PreCheckError::new(ResponseCode::TransactionOversize));
        }

        let signed: SignedTransaction = bcs::from_bytes(raw_bytes)
            .map_err(|_| PreCheckError::new(ResponseCode::InvalidTransaction))?;
        let body: TransactionBody = bcs::from_bytes(&signed.body_bytes)
            .map_err(|_| PreCheckError::new(ResponseCode::InvalidTransaction))?;

        let tx_id = body
            .transaction_id
            .ok_or_else(|| PreCheckError::new(ResponseCode::InvalidTransactionId))?;

        if let Some(0) = tx_id.payer.num() {
            return Err(PreCheckError::new(ResponseCode::InvalidPayerAccountId));
        }

        if body.valid_duration_secs < config.transaction_min_valid_duration_secs
            || body.valid_duration_secs > config.transaction_max_valid_duration_secs
        {
            return Err(PreCheckError::new(ResponseCode::InvalidTransactionDuration));
        }

        let earliest = now.saturating_sub_secs(config.transaction_max_valid_duration_secs as i64);
        let latest = now.saturating_add_secs(config.valid_start_skew_secs as i64);
        if tx_id.valid_start < earliest {
            return Err(PreCheckError::new(ResponseCode::TransactionExpired));
        }
        if tx_id.valid_start > latest {
            return Err(PreCheckError::new(ResponseCode::InvalidTransactionStart));
        }

        if body.memo.len() > config.max_memo_bytes {
            return Err(PreCheckError::new(ResponseCode::MemoTooLong));
        }

        check_prefixes_disjoint(&signed.sig_map)?;

        Ok(TransactionInfo {
            signed_bytes: signed.body_bytes,
            tx_id,
            sig_map: signed.sig_map,
            body,
        })
    }
}

/// Rejects maps where one entry's public-key prefix is a prefix of
/// another's; such a map could match two signatures to the same key and
/// expansion would become ambiguous.
fn check_prefixes_disjoint(sig_map: &SignatureMap) -> Result<(), PreCheckError> {
    let pairs = &sig_map.sig_pairs;
    for (index, a) in pairs.iter().enumerate() {
        for b in &pairs[index + 1..] {
            if a.pub_key_prefix.starts_with(&b.pub_key_prefix)
                || b.pub_key_prefix.starts_with(&a.pub_key_prefix)
            {
                return Err(PreCheckError::new(ResponseCode::KeyPrefixMismatch));
            }
        }
    }
    Ok(())
}
