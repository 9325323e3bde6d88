// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event-framework adapter seam.
//!
//! Watchers are keyed by [`Token`] (the owning job's id). The event thread is
//! the only caller of every method here; the single-threaded-access invariant
//! replaces any internal locking.

use ns_core::{JobType, Result};
use nix::sys::signal::Signal;
use std::os::fd::BorrowedFd;
use std::time::Duration;

/// Identifies a watcher registration; assigned by the dispatcher core.
pub type Token = u64;

/// What fired for a watcher on one multiplexer cycle.
///
/// For a combined fd+deadline watcher, exactly one variant is delivered per
/// cycle; the non-firing side is cancelled before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// Fd readiness, masked to the directions the watcher asked for.
    Io { readable: bool, writable: bool },
    /// The deadline expired.
    Timer,
    /// The signal was delivered.
    Signal(Signal),
}

/// Result of one multiplexer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The cycle waited and may have produced firings.
    Normal,
    /// Nothing is registered; the cycle had nothing to wait for.
    NoEvents,
}

/// Uniform interface over a readiness multiplexer.
///
/// Every watcher is one-shot at this level: delivering a firing deactivates
/// it, and a subsequent `mod_*` reactivates it. Persistent jobs are re-armed
/// by the dispatcher after their callback returns, which lands back here as a
/// `mod_*` call before the next cycle.
pub trait EventAdapter: Send {
    /// Register an fd watcher for the direction bits in `job_type`.
    ///
    /// A `deadline` gives the same watcher a timer side: whichever of
    /// readiness or expiry happens first fires, and the other side is
    /// cancelled for that cycle.
    fn add_io(
        &mut self,
        token: Token,
        fd: BorrowedFd<'_>,
        job_type: JobType,
        deadline: Option<Duration>,
    ) -> Result<()>;

    /// Update direction bits and deadline of an existing fd watcher, and
    /// reactivate it.
    fn mod_io(&mut self, token: Token, job_type: JobType, deadline: Option<Duration>) -> Result<()>;

    /// Unregister the fd watcher and release everything it holds.
    fn io_done(&mut self, token: Token);

    /// Register a one-shot relative timer.
    fn add_timer(&mut self, token: Token, timeout: Duration) -> Result<()>;

    /// Reset the timer to fire `timeout` from now, and reactivate it.
    fn mod_timer(&mut self, token: Token, timeout: Duration) -> Result<()>;

    /// Unregister the timer.
    fn timer_done(&mut self, token: Token);

    /// Register a signal watcher.
    fn add_signal(&mut self, token: Token, signal: Signal) -> Result<()>;

    /// Reactivate a signal watcher after a firing.
    fn mod_signal(&mut self, token: Token) -> Result<()>;

    /// Unregister the signal watcher.
    fn signal_done(&mut self, token: Token);

    /// Run one cycle: wait for readiness, expiry, or signal delivery, and
    /// append `(token, fired)` pairs for everything that fired. There is no
    /// ordering guarantee among the firings of one cycle.
    fn poll_once(&mut self, firings: &mut Vec<(Token, Fired)>) -> Result<LoopOutcome>;
}
