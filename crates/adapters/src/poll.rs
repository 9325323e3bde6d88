// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `poll(2)` adapter.
//!
//! Io watchers hold their own dup of the watched fd, so registration lifetime
//! is independent of when the job record closes its copy (readiness is a
//! property of the open file description, which both share). Timers are kept
//! as absolute deadlines and realized through the poll timeout. Signal
//! watchers are self-pipes: a process-wide handler writes one byte into a
//! non-blocking pipe whose read end joins the poll set.

use crate::event::{EventAdapter, Fired, LoopOutcome, Token};
use ns_core::{Error, JobType, Logger, Priority, Result};
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::Signal;
use nix::unistd::pipe2;
use std::collections::HashMap;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct IoWatcher {
    fd: OwnedFd,
    job_type: JobType,
    deadline: Option<Instant>,
    active: bool,
}

struct TimerWatcher {
    deadline: Instant,
    active: bool,
}

struct SignalWatcher {
    signal: Signal,
    read: OwnedFd,
    sig_id: signal_hook::SigId,
    active: bool,
}

/// Production [`EventAdapter`] over `poll(2)`.
pub struct PollAdapter {
    io: HashMap<Token, IoWatcher>,
    timers: HashMap<Token, TimerWatcher>,
    signals: HashMap<Token, SignalWatcher>,
    logger: Arc<dyn Logger>,
}

impl PollAdapter {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        PollAdapter {
            io: HashMap::new(),
            timers: HashMap::new(),
            signals: HashMap::new(),
            logger,
        }
    }

    fn active_watchers(&self) -> usize {
        self.io.values().filter(|w| w.active).count()
            + self.timers.values().filter(|w| w.active).count()
            + self.signals.values().filter(|w| w.active).count()
    }

    /// Earliest pending deadline across io-with-deadline and timer watchers.
    fn next_deadline(&self) -> Option<Instant> {
        let io = self
            .io
            .values()
            .filter(|w| w.active)
            .filter_map(|w| w.deadline);
        let timers = self
            .timers
            .values()
            .filter(|w| w.active)
            .map(|w| w.deadline);
        io.chain(timers).min()
    }

    fn poll_timeout(&self, now: Instant) -> PollTimeout {
        match self.next_deadline() {
            None => PollTimeout::NONE,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(now);
                // Round up so a sub-millisecond remainder does not spin.
                let ms = (remaining.as_millis() + 1).min(u128::from(u16::MAX)) as u16;
                PollTimeout::from(if remaining.is_zero() { 0 } else { ms })
            }
        }
    }
}

#[derive(Clone, Copy)]
enum WatchKind {
    Io,
    Signal,
}

fn interest_flags(job_type: JobType) -> PollFlags {
    let mut flags = PollFlags::empty();
    if job_type.wants_read() {
        flags |= PollFlags::POLLIN;
    }
    if job_type.wants_write() {
        flags |= PollFlags::POLLOUT;
    }
    flags
}

/// Drain a non-blocking pipe; each handler invocation wrote one byte, all of
/// which collapse into a single delivery.
fn drain_pipe(fd: BorrowedFd<'_>) {
    let mut buf = [0u8; 64];
    while let Ok(n) = nix::unistd::read(fd.as_raw_fd(), &mut buf) {
        if n < buf.len() {
            break;
        }
    }
}

impl EventAdapter for PollAdapter {
    fn add_io(
        &mut self,
        token: Token,
        fd: BorrowedFd<'_>,
        job_type: JobType,
        deadline: Option<Duration>,
    ) -> Result<()> {
        let dup = fd.try_clone_to_owned().map_err(Error::Allocation)?;
        self.io.insert(
            token,
            IoWatcher {
                fd: dup,
                job_type,
                deadline: deadline.map(|d| Instant::now() + d),
                active: true,
            },
        );
        Ok(())
    }

    fn mod_io(&mut self, token: Token, job_type: JobType, deadline: Option<Duration>) -> Result<()> {
        let Some(watcher) = self.io.get_mut(&token) else {
            return Err(Error::InvalidRequest("no io watcher for token"));
        };
        if !job_type.is_io() {
            // Clearing the direction bits withdraws the watcher from the set.
            watcher.active = false;
            return Ok(());
        }
        watcher.job_type = job_type;
        watcher.deadline = deadline.map(|d| Instant::now() + d);
        watcher.active = true;
        Ok(())
    }

    fn io_done(&mut self, token: Token) {
        self.io.remove(&token);
    }

    fn add_timer(&mut self, token: Token, timeout: Duration) -> Result<()> {
        self.timers.insert(
            token,
            TimerWatcher {
                deadline: Instant::now() + timeout,
                active: true,
            },
        );
        Ok(())
    }

    fn mod_timer(&mut self, token: Token, timeout: Duration) -> Result<()> {
        let Some(watcher) = self.timers.get_mut(&token) else {
            return Err(Error::InvalidRequest("no timer watcher for token"));
        };
        watcher.deadline = Instant::now() + timeout;
        watcher.active = true;
        Ok(())
    }

    fn timer_done(&mut self, token: Token) {
        self.timers.remove(&token);
    }

    fn add_signal(&mut self, token: Token, signal: Signal) -> Result<()> {
        let (read, write) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(|e| Error::Allocation(e.into()))?;
        let sig_id = signal_hook::low_level::pipe::register(signal as i32, write)
            .map_err(Error::Allocation)?;
        self.signals.insert(
            token,
            SignalWatcher {
                signal,
                read,
                sig_id,
                active: true,
            },
        );
        Ok(())
    }

    fn mod_signal(&mut self, token: Token) -> Result<()> {
        let Some(watcher) = self.signals.get_mut(&token) else {
            return Err(Error::InvalidRequest("no signal watcher for token"));
        };
        watcher.active = true;
        Ok(())
    }

    fn signal_done(&mut self, token: Token) {
        if let Some(watcher) = self.signals.remove(&token) {
            signal_hook::low_level::unregister(watcher.sig_id);
        }
    }

    fn poll_once(&mut self, firings: &mut Vec<(Token, Fired)>) -> Result<LoopOutcome> {
        if self.active_watchers() == 0 {
            return Ok(LoopOutcome::NoEvents);
        }

        let timeout = self.poll_timeout(Instant::now());

        // Poll set and an index-aligned token list; the borrow of the watcher
        // fds ends before any watcher is mutated below. A job may hold both
        // an io and a signal watcher under the same token, so the kind rides
        // along.
        let mut ready: Vec<(Token, WatchKind, PollFlags)> = Vec::new();
        {
            let mut tokens: Vec<(Token, WatchKind)> = Vec::new();
            let mut pollfds: Vec<PollFd<'_>> = Vec::new();
            for (token, w) in self.io.iter().filter(|(_, w)| w.active) {
                tokens.push((*token, WatchKind::Io));
                pollfds.push(PollFd::new(w.fd.as_fd(), interest_flags(w.job_type)));
            }
            for (token, w) in self.signals.iter().filter(|(_, w)| w.active) {
                tokens.push((*token, WatchKind::Signal));
                pollfds.push(PollFd::new(w.read.as_fd(), PollFlags::POLLIN));
            }

            match poll(&mut pollfds, timeout) {
                Ok(_) => {}
                Err(nix::errno::Errno::EINTR) => return Ok(LoopOutcome::Normal),
                Err(e) => return Err(Error::Adapter(e.into())),
            }

            for ((token, kind), pollfd) in tokens.iter().zip(&pollfds) {
                let revents = pollfd.revents().unwrap_or_else(PollFlags::empty);
                if !revents.is_empty() {
                    ready.push((*token, *kind, revents));
                }
            }
        }

        let now = Instant::now();

        for (token, kind, revents) in ready {
            match kind {
                WatchKind::Io => {
                    let Some(w) = self.io.get_mut(&token) else {
                        continue;
                    };
                    if revents.contains(PollFlags::POLLNVAL) {
                        self.logger.log(
                            Priority::Error,
                            &format!("io watcher {token}: fd no longer valid, dropping watcher"),
                        );
                        w.active = false;
                        continue;
                    }
                    let hangup = revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP);
                    let readable =
                        (revents.contains(PollFlags::POLLIN) || hangup) && w.job_type.wants_read();
                    let writable = (revents.contains(PollFlags::POLLOUT) || hangup)
                        && w.job_type.wants_write();
                    if readable || writable {
                        w.active = false;
                        w.deadline = None;
                        firings.push((token, Fired::Io { readable, writable }));
                    }
                }
                WatchKind::Signal => {
                    let Some(w) = self.signals.get_mut(&token) else {
                        continue;
                    };
                    drain_pipe(w.read.as_fd());
                    w.active = false;
                    firings.push((token, Fired::Signal(w.signal)));
                }
            }
        }

        // Expired deadlines: the io side of a combined watcher that fired
        // above already cleared its deadline, so the loser never reports.
        for (token, w) in self.io.iter_mut().filter(|(_, w)| w.active) {
            if w.deadline.is_some_and(|d| d <= now) {
                w.active = false;
                w.deadline = None;
                firings.push((*token, Fired::Timer));
            }
        }
        for (token, w) in self.timers.iter_mut().filter(|(_, w)| w.active) {
            if w.deadline <= now {
                w.active = false;
                firings.push((*token, Fired::Timer));
            }
        }

        Ok(LoopOutcome::Normal)
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
