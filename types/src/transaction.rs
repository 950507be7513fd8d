// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{account::AccountId, timestamp::Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a user transaction across the deduplication window:
/// the paying account, the client-chosen valid-start time, and a nonce
/// distinguishing child transactions spawned from the same parent.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TransactionId {
    pub payer: AccountId,
    pub valid_start: Timestamp,
    pub nonce: u32,
}

impl TransactionId {
    pub fn new(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            payer,
            valid_start,
            nonce: 0,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.payer, self.valid_start, self.nonce)
    }
}

/// The signature scheme a [`SignaturePair`] claims to carry. Only the first
/// two are accepted by the signature expander; the others exist so foreign
/// maps decode, and are rejected as malformed before verification.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SignatureKind {
    Ed25519,
    EcdsaSecp256k1,
    Contract,
    EcdsaP384,
    Rsa3072,
    Unset,
}

/// One entry of a transaction's signature map. `pub_key_prefix` may be any
/// prefix of the signing public key, down to a single byte, as long as it is
/// unambiguous within the map.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SignaturePair {
    #[serde(with = "serde_bytes")]
    pub pub_key_prefix: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub kind: SignatureKind,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SignatureMap {
    pub sig_pairs: Vec<SignaturePair>,
}

impl SignatureMap {
    pub fn new(sig_pairs: Vec<SignaturePair>) -> Self {
        Self { sig_pairs }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AccountAmount {
    pub account: AccountId,
    /// Positive credits, negative debits, in tinybars.
    pub amount: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransferList {
    pub account_amounts: Vec<AccountAmount>,
}

/// Operational freeze request; the schedule variant arms a network freeze at
/// the given consensus time, abort disarms a pending one.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FreezeBody {
    Schedule { start_time: Timestamp },
    Abort,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TransactionPayload {
    CryptoTransfer(TransferList),
    Freeze(FreezeBody),
}

/// Discriminant of [`TransactionPayload`], used to route to a typed handler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PayloadKind {
    CryptoTransfer,
    Freeze,
}

impl TransactionPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            TransactionPayload::CryptoTransfer(_) => PayloadKind::CryptoTransfer,
            TransactionPayload::Freeze(_) => PayloadKind::Freeze,
        }
    }
}

/// The functional request a user signs. `transaction_id` is optional at the
/// wire level; its absence is a pre-check failure, never a decode failure.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransactionBody {
    pub transaction_id: Option<TransactionId>,
    pub node_account_id: AccountId,
    pub valid_duration_secs: u64,
    pub memo: String,
    pub payload: TransactionPayload,
}

/// The wire envelope gossiped between nodes: the canonical bytes of a
/// [`TransactionBody`] (exactly what signatures cover) plus the signature
/// map. The envelope is itself bcs-encoded into the raw gossip payload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SignedTransaction {
    #[serde(with = "serde_bytes")]
    pub body_bytes: Vec<u8>,
    pub sig_map: SignatureMap,
}

impl SignedTransaction {
    /// Encodes `body` canonically and wraps it with `sig_map`.
    pub fn from_body(body: &TransactionBody, sig_map: SignatureMap) -> bcs::Result<Self> {
        Ok(Self {
            body_bytes: bcs::to_bytes(body)?,
            sig_map,
        })
    }

    pub fn to_bytes(&self) -> bcs::Result<Vec<u8>> {
        bcs::to_bytes(self)
    }
}

/// A fully parsed and pre-checked transaction. Construction implies the
/// structural checks passed; in particular `tx_id` is the id the body
/// carried, never synthesized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionInfo {
    pub signed_bytes: Vec<u8>,
    pub body: TransactionBody,
    pub tx_id: TransactionId,
    pub sig_map: SignatureMap,
}

impl TransactionInfo {
    pub fn payer(&self) -> AccountId {
        self.tx_id.payer
    }
}
