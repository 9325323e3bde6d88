// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool configuration.

use crate::error::{Error, Result};
use crate::log::{Logger, TracingLogger};
use std::fmt;
use std::sync::Arc;

/// Sentinel stamped by [`PoolConfig::new`]; a config whose `init_flag` does
/// not match is rejected at pool construction.
pub const INIT_MAGIC: u32 = 0x0defa014;

/// Configuration for a thread pool.
///
/// Obtain one from [`PoolConfig::new`] and adjust fields or use the chained
/// setters; a hand-rolled config without the sentinel is rejected.
#[derive(Clone)]
pub struct PoolConfig {
    /// Must equal [`INIT_MAGIC`].
    pub init_flag: u32,
    /// Number of worker threads.
    pub max_threads: usize,
    /// Worker/event thread stack size in bytes; 0 uses the platform default.
    pub stacksize: usize,
    /// Diagnostic sink.
    pub logger: Arc<dyn Logger>,
}

impl PoolConfig {
    pub fn new() -> Self {
        PoolConfig {
            init_flag: INIT_MAGIC,
            max_threads: 1,
            stacksize: 0,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn stacksize(mut self, bytes: usize) -> Self {
        self.stacksize = bytes;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Check the sentinel and parameter sanity.
    pub fn validate(&self) -> Result<()> {
        if self.init_flag != INIT_MAGIC {
            return Err(Error::InvalidRequest("config has not been initialized"));
        }
        if self.max_threads == 0 {
            return Err(Error::InvalidRequest("max_threads must be at least 1"));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("init_flag", &format_args!("{:#x}", self.init_flag))
            .field("max_threads", &self.max_threads)
            .field("stacksize", &self.stacksize)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
