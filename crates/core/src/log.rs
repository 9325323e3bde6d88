// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable logger sink.
//!
//! The dispatcher emits `(priority, message)` pairs through whatever sink is
//! installed at pool construction; the default forwards to `tracing`.

use std::fmt;

/// Syslog-style log priorities, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Priority {
    /// Numeric syslog level (0 = emergency .. 7 = debug).
    pub fn as_syslog(self) -> i32 {
        match self {
            Priority::Emergency => 0,
            Priority::Alert => 1,
            Priority::Critical => 2,
            Priority::Error => 3,
            Priority::Warning => 4,
            Priority::Notice => 5,
            Priority::Info => 6,
            Priority::Debug => 7,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Emergency => "emerg",
            Priority::Alert => "alert",
            Priority::Critical => "crit",
            Priority::Error => "err",
            Priority::Warning => "warning",
            Priority::Notice => "notice",
            Priority::Info => "info",
            Priority::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Sink for dispatcher diagnostics.
///
/// `start` is called once when the pool is constructed and `close` once when
/// it is destroyed, bracketing the sink's lifetime.
pub trait Logger: Send + Sync {
    fn log(&self, priority: Priority, message: &str);

    fn start(&self) {}

    fn close(&self) {}
}

/// Default sink: forwards each message to `tracing` at the mapped level.
///
/// Emergency through Error map to `error!`, Warning to `warn!`, Notice and
/// Info to `info!`, Debug to `debug!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, priority: Priority, message: &str) {
        match priority {
            Priority::Emergency | Priority::Alert | Priority::Critical | Priority::Error => {
                tracing::error!(%priority, "{message}");
            }
            Priority::Warning => tracing::warn!("{message}"),
            Priority::Notice | Priority::Info => tracing::info!("{message}"),
            Priority::Debug => tracing::debug!("{message}"),
        }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
