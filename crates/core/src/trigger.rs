// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job trigger bit set.
//!
//! A job's trigger describes what causes its callback to run: readiness on a
//! file descriptor, a timer expiry, a signal, or nothing at all (immediate
//! dispatch), plus modifiers that shape how the firing is handled.

use crate::error::{Error, Result};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of job triggers and modifiers.
///
/// Compose with `|`: `JobType::READ | JobType::PERSIST | JobType::THREAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JobType(u16);

impl JobType {
    /// No trigger: the job runs once, immediately upon arming.
    pub const NONE: JobType = JobType(0);
    /// Fire when the fd is ready to accept a connection.
    pub const ACCEPT: JobType = JobType(1 << 0);
    /// Fire when a pending connect on the fd completes.
    pub const CONNECT: JobType = JobType(1 << 1);
    /// Fire when the fd is readable.
    pub const READ: JobType = JobType(1 << 2);
    /// Fire when the fd is writable.
    pub const WRITE: JobType = JobType(1 << 3);
    /// Fire when the timeout expires.
    pub const TIMER: JobType = JobType(1 << 4);
    /// Fire when the signal is delivered.
    pub const SIGNAL: JobType = JobType(1 << 5);
    /// Re-arm the job automatically after each firing.
    pub const PERSIST: JobType = JobType(1 << 6);
    /// Run the callback on a worker thread instead of the event thread.
    pub const THREAD: JobType = JobType(1 << 7);
    /// Do not close the fd when the job is torn down.
    pub const PRESERVE_FD: JobType = JobType(1 << 8);
    /// Internal: tells the receiving worker thread to exit.
    pub const SHUTDOWN_WORKER: JobType = JobType(1 << 9);

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: JobType) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`.
    pub fn intersects(self, other: JobType) -> bool {
        self.0 & other.0 != 0
    }

    /// True if any I/O direction bit is set.
    pub fn is_io(self) -> bool {
        self.intersects(Self::ACCEPT | Self::CONNECT | Self::READ | Self::WRITE)
    }

    /// True if the I/O side wants read-readiness.
    pub fn wants_read(self) -> bool {
        self.intersects(Self::READ | Self::ACCEPT)
    }

    /// True if the I/O side wants write-readiness.
    pub fn wants_write(self) -> bool {
        self.intersects(Self::WRITE | Self::CONNECT)
    }

    pub fn is_timer(self) -> bool {
        self.contains(Self::TIMER)
    }

    pub fn is_signal(self) -> bool {
        self.contains(Self::SIGNAL)
    }

    pub fn is_persist(self) -> bool {
        self.contains(Self::PERSIST)
    }

    pub fn is_threaded(self) -> bool {
        self.contains(Self::THREAD)
    }

    pub fn is_preserve_fd(self) -> bool {
        self.contains(Self::PRESERVE_FD)
    }

    pub fn is_shutdown_worker(self) -> bool {
        self.contains(Self::SHUTDOWN_WORKER)
    }

    /// True if the job needs the event thread at all: it watches an fd, a
    /// timer, or a signal. Jobs without an event trigger are dispatched
    /// straight to their execution site.
    pub fn has_event_trigger(self) -> bool {
        self.is_io() || self.is_timer() || self.is_signal()
    }

    /// Validate a user-submitted trigger combination.
    ///
    /// ACCEPT|THREAD is rejected so a listener cannot block the worker pool
    /// against shutdown; SHUTDOWN_WORKER is reserved for the pool itself.
    pub fn validate_submission(self) -> Result<()> {
        if self.is_shutdown_worker() {
            return Err(Error::InvalidRequest("SHUTDOWN_WORKER is internal"));
        }
        if self.contains(Self::ACCEPT | Self::THREAD) {
            return Err(Error::InvalidRequest("ACCEPT jobs may not be threaded"));
        }
        Ok(())
    }
}

impl BitOr for JobType {
    type Output = JobType;

    fn bitor(self, rhs: JobType) -> JobType {
        JobType(self.0 | rhs.0)
    }
}

impl BitOrAssign for JobType {
    fn bitor_assign(&mut self, rhs: JobType) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(JobType, &str); 10] = [
            (JobType::ACCEPT, "accept"),
            (JobType::CONNECT, "connect"),
            (JobType::READ, "read"),
            (JobType::WRITE, "write"),
            (JobType::TIMER, "timer"),
            (JobType::SIGNAL, "signal"),
            (JobType::PERSIST, "persist"),
            (JobType::THREAD, "thread"),
            (JobType::PRESERVE_FD, "preserve-fd"),
            (JobType::SHUTDOWN_WORKER, "shutdown-worker"),
        ];
        if self.0 == 0 {
            return f.write_str("none");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
