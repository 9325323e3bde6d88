// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ns-engine: the dispatcher core.
//!
//! One event thread owns the readiness adapter and performs every watcher
//! registration; a bounded pool of worker threads executes THREAD-tagged job
//! callbacks; lock-free queues and a self-pipe connect the two.

mod dispatch;
mod events;
mod worker;

pub mod job;
pub mod pool;
pub(crate) mod queue;

pub use job::{Job, JobCallback, UserData};
pub use pool::{PoolHandle, ThreadPool};

// Core vocabulary, re-exported so callers need only one crate.
pub use ns_core::{
    Error, JobState, JobType, Logger, PoolConfig, Priority, Result, Timeout, TracingLogger,
};
pub use nix::sys::signal::Signal;
