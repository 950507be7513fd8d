// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Configuration consumed by the transaction lifecycle engine. Loading from
//! disk and dynamic reconfiguration live in the node shell; this crate only
//! defines the recognized options, their defaults, and the versioned
//! snapshot the workflows pin per transaction.

use canopy_types::account::AccountId;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub mod defaults {
    pub const VERIFICATION_TIMEOUT_MS: u64 = 20_000;
    pub const TRANSACTION_MAX_VALID_DURATION_SECS: u64 = 180;
    pub const TRANSACTION_MIN_VALID_DURATION_SECS: u64 = 15;
    pub const RECORDS_MAX_QUERYABLE_BY_ACCOUNT: usize = 10;
    pub const MAX_TRANSACTION_BYTES: usize = 6_144;
    pub const MAX_MEMO_BYTES: usize = 100;
    pub const VALID_START_SKEW_SECS: u64 = 10;
    pub const NODE_PENALTY_FEE: u64 = 10;
    pub const SERVICE_FEE: u64 = 100;
    pub const FUNDING_ACCOUNT_NUM: u64 = 98;
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Upper bound on a single `verification_for` wait, in milliseconds.
    pub verification_timeout_ms: u64,
    /// Deduplication horizon: how far a transaction's valid-start may lie in
    /// the past, in seconds.
    pub transaction_max_valid_duration_secs: u64,
    pub transaction_min_valid_duration_secs: u64,
    pub records_max_queryable_by_account: usize,
    pub max_transaction_bytes: usize,
    pub max_memo_bytes: usize,
    /// Tolerated clock skew for valid-start times in the future, in seconds.
    pub valid_start_skew_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            verification_timeout_ms: defaults::VERIFICATION_TIMEOUT_MS,
            transaction_max_valid_duration_secs: defaults::TRANSACTION_MAX_VALID_DURATION_SECS,
            transaction_min_valid_duration_secs: defaults::TRANSACTION_MIN_VALID_DURATION_SECS,
            records_max_queryable_by_account: defaults::RECORDS_MAX_QUERYABLE_BY_ACCOUNT,
            max_transaction_bytes: defaults::MAX_TRANSACTION_BYTES,
            max_memo_bytes: defaults::MAX_MEMO_BYTES,
            valid_start_skew_secs: defaults::VALID_START_SKEW_SECS,
        }
    }
}

impl WorkflowConfig {
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    pub fn max_valid_duration(&self) -> Duration {
        Duration::from_secs(self.transaction_max_valid_duration_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeeConfig {
    /// Flat penalty debited from a node that gossips a transaction failing
    /// due diligence, in tinybars.
    pub node_penalty_fee: u64,
    /// Flat fee debited from the payer of a handled transaction, in tinybars.
    pub service_fee: u64,
    /// Account credited with all collected fees and penalties.
    pub funding_account: AccountId,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            node_penalty_fee: defaults::NODE_PENALTY_FEE,
            service_fee: defaults::SERVICE_FEE,
            funding_account: AccountId::new(0, 0, defaults::FUNDING_ACCOUNT_NUM),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FreezeConfig {
    /// Directory the freeze handler drops its operational marker files into.
    pub artifacts_dir: PathBuf,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("."),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub workflow: WorkflowConfig,
    pub fees: FeeConfig,
    pub freeze: FreezeConfig,
}

/// A configuration snapshot tagged with the monotonic version the node shell
/// bumps on every reconfiguration. Pre-handle results remember the version
/// they were computed under; the handle workflow re-runs any result whose
/// version no longer matches.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VersionedConfig {
    pub version: u64,
    pub node: NodeConfig,
}

impl VersionedConfig {
    pub fn new(version: u64, node: NodeConfig) -> Self {
        Self { version, node }
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        &self.node.workflow
    }

    pub fn fees(&self) -> &FeeConfig {
        &self.node.fees
    }

    pub fn freeze(&self) -> &FreezeConfig {
        &self.node.freeze
    }
}

impl Default for VersionedConfig {
    fn default() -> Self {
        Self::new(1, NodeConfig::default())
    }
}
