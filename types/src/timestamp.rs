// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A nanosecond-precision point in time, as assigned by consensus or carried
/// in a transaction id. Total order is (seconds, nanos).
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds + (nanos / NANOS_PER_SECOND) as i64,
            nanos: nanos % NANOS_PER_SECOND,
        }
    }

    pub fn from_secs(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Wall-clock now, truncated to the epoch-based representation.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            seconds: since_epoch.as_secs() as i64,
            nanos: since_epoch.subsec_nanos(),
        }
    }

    pub fn saturating_add_secs(self, secs: i64) -> Self {
        Self {
            seconds: self.seconds.saturating_add(secs),
            nanos: self.nanos,
        }
    }

    pub fn saturating_sub_secs(self, secs: i64) -> Self {
        self.saturating_add_secs(-secs)
    }

    /// Advances by `nanos`, carrying into the seconds field.
    pub fn saturating_add_nanos(self, nanos: u64) -> Self {
        let total = self.nanos as u64 + nanos;
        Self {
            seconds: self.seconds.saturating_add((total / NANOS_PER_SECOND as u64) as i64),
            nanos: (total % NANOS_PER_SECOND as u64) as u32,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
