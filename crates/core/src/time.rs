// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer timeout value.

use crate::error::{Error, Result};
use std::time::Duration;

/// Relative timeout for timer-triggered jobs, in seconds and microseconds.
///
/// Both fields must be non-negative; `{0, 0}` is legal and fires on the next
/// multiplexer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    pub secs: i64,
    pub micros: i64,
}

impl Timeout {
    pub const ZERO: Timeout = Timeout { secs: 0, micros: 0 };

    pub fn new(secs: i64, micros: i64) -> Self {
        Timeout { secs, micros }
    }

    /// Reject negative components at submission time.
    pub fn validate(self) -> Result<()> {
        if self.secs < 0 || self.micros < 0 {
            return Err(Error::InvalidRequest("timeout must be non-negative"));
        }
        Ok(())
    }

    /// Convert to a `Duration`. Only meaningful after `validate`.
    pub fn to_duration(self) -> Duration {
        let secs = self.secs.max(0) as u64;
        let micros = self.micros.max(0) as u64;
        Duration::from_secs(secs) + Duration::from_micros(micros)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout {
            secs: d.as_secs() as i64,
            micros: i64::from(d.subsec_micros()),
        }
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
