// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length in bytes of an EVM-style account alias.
pub const EVM_ALIAS_LENGTH: usize = 20;

#[derive(Debug, Error)]
pub enum AccountParseError {
    #[error("alias must be {EVM_ALIAS_LENGTH} bytes, got {0}")]
    BadAliasLength(usize),
}

/// A 20-byte alias derived from the keccak256 of an uncompressed ECDSA
/// public key. Identifies an account before (and after) it holds a key.
#[derive(Clone, Copy, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EvmAlias(pub [u8; EVM_ALIAS_LENGTH]);

impl EvmAlias {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AccountParseError> {
        let arr: [u8; EVM_ALIAS_LENGTH] = bytes
            .try_into()
            .map_err(|_| AccountParseError::BadAliasLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EvmAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAlias({self})")
    }
}

/// The entity portion of an account id: either a ledger-assigned number or,
/// for accounts not yet (or never) numbered on this node, an EVM alias.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AccountRef {
    Num(u64),
    Alias(EvmAlias),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub account: AccountRef,
}

impl AccountId {
    pub fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self {
            shard,
            realm,
            account: AccountRef::Num(num),
        }
    }

    pub fn with_alias(shard: u64, realm: u64, alias: EvmAlias) -> Self {
        Self {
            shard,
            realm,
            account: AccountRef::Alias(alias),
        }
    }

    pub fn num(&self) -> Option<u64> {
        match self.account {
            AccountRef::Num(num) => Some(num),
            AccountRef::Alias(_) => None,
        }
    }

    pub fn alias(&self) -> Option<&EvmAlias> {
        match &self.account {
            AccountRef::Num(_) => None,
            AccountRef::Alias(alias) => Some(alias),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.account, AccountRef::Alias(_))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            AccountRef::Num(num) => write!(f, "{}.{}.{}", self.shard, self.realm, num),
            AccountRef::Alias(alias) => write!(f, "{}.{}.{}", self.shard, self.realm, alias),
        }
    }
}

/// An account as materialized in the replicated state. A *hollow* account
/// carries an alias but no key yet; it can only authorize transactions
/// through a signature whose recovered alias matches.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub key: Option<Key>,
    pub alias: Option<EvmAlias>,
    pub balance: u64,
    pub deleted: bool,
}

impl Account {
    pub fn new(id: AccountId, key: Key, balance: u64) -> Self {
        Self {
            id,
            key: Some(key),
            alias: None,
            balance,
            deleted: false,
        }
    }

    pub fn hollow(id: AccountId, alias: EvmAlias, balance: u64) -> Self {
        Self {
            id,
            key: None,
            alias: Some(alias),
            balance,
            deleted: false,
        }
    }

    pub fn is_hollow(&self) -> bool {
        self.key.is_none() && self.alias.is_some()
    }
}
