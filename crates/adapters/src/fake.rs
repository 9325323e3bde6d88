// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory adapter for tests.
//!
//! Registrations are recorded, nothing touches the OS, and firings are
//! injected through a cloneable [`FakeControl`] handle.

use crate::event::{EventAdapter, Fired, LoopOutcome, Token};
use ns_core::{Error, JobType, Result};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Registry {
    io: HashMap<Token, (JobType, Option<Duration>, bool)>,
    timers: HashMap<Token, (Duration, bool)>,
    signals: HashMap<Token, (Signal, bool)>,
}

/// Test double for [`EventAdapter`].
pub struct FakeAdapter {
    registry: Arc<Mutex<Registry>>,
    rx: crossbeam_channel::Receiver<(Token, Fired)>,
}

/// Drives a [`FakeAdapter`] from a test: injects firings and inspects what
/// the dispatcher registered.
#[derive(Clone)]
pub struct FakeControl {
    registry: Arc<Mutex<Registry>>,
    tx: crossbeam_channel::Sender<(Token, Fired)>,
}

impl FakeAdapter {
    pub fn new() -> (FakeAdapter, FakeControl) {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            FakeAdapter {
                registry: Arc::clone(&registry),
                rx,
            },
            FakeControl { registry, tx },
        )
    }
}

impl FakeControl {
    /// Inject a firing; the adapter's next cycle delivers it.
    pub fn fire(&self, token: Token, fired: Fired) {
        let _ = self.tx.send((token, fired));
    }

    pub fn io_registered(&self, token: Token) -> bool {
        self.registry.lock().io.contains_key(&token)
    }

    pub fn io_active(&self, token: Token) -> bool {
        self.registry.lock().io.get(&token).is_some_and(|w| w.2)
    }

    pub fn timer_registered(&self, token: Token) -> bool {
        self.registry.lock().timers.contains_key(&token)
    }

    pub fn signal_registered(&self, token: Token) -> bool {
        self.registry.lock().signals.contains_key(&token)
    }

    pub fn watcher_count(&self) -> usize {
        let r = self.registry.lock();
        r.io.len() + r.timers.len() + r.signals.len()
    }
}

impl EventAdapter for FakeAdapter {
    fn add_io(
        &mut self,
        token: Token,
        _fd: BorrowedFd<'_>,
        job_type: JobType,
        deadline: Option<Duration>,
    ) -> Result<()> {
        self.registry.lock().io.insert(token, (job_type, deadline, true));
        Ok(())
    }

    fn mod_io(&mut self, token: Token, job_type: JobType, deadline: Option<Duration>) -> Result<()> {
        match self.registry.lock().io.get_mut(&token) {
            Some(w) => {
                *w = (job_type, deadline, true);
                Ok(())
            }
            None => Err(Error::InvalidRequest("no io watcher for token")),
        }
    }

    fn io_done(&mut self, token: Token) {
        self.registry.lock().io.remove(&token);
    }

    fn add_timer(&mut self, token: Token, timeout: Duration) -> Result<()> {
        self.registry.lock().timers.insert(token, (timeout, true));
        Ok(())
    }

    fn mod_timer(&mut self, token: Token, timeout: Duration) -> Result<()> {
        match self.registry.lock().timers.get_mut(&token) {
            Some(w) => {
                *w = (timeout, true);
                Ok(())
            }
            None => Err(Error::InvalidRequest("no timer watcher for token")),
        }
    }

    fn timer_done(&mut self, token: Token) {
        self.registry.lock().timers.remove(&token);
    }

    fn add_signal(&mut self, token: Token, signal: Signal) -> Result<()> {
        self.registry.lock().signals.insert(token, (signal, true));
        Ok(())
    }

    fn mod_signal(&mut self, token: Token) -> Result<()> {
        match self.registry.lock().signals.get_mut(&token) {
            Some(w) => {
                w.1 = true;
                Ok(())
            }
            None => Err(Error::InvalidRequest("no signal watcher for token")),
        }
    }

    fn signal_done(&mut self, token: Token) {
        self.registry.lock().signals.remove(&token);
    }

    fn poll_once(&mut self, firings: &mut Vec<(Token, Fired)>) -> Result<LoopOutcome> {
        // Block briefly so the dispatcher loop does not spin in tests.
        match self.rx.recv_timeout(Duration::from_millis(10)) {
            Ok(firing) => {
                firings.push(firing);
                while let Ok(more) = self.rx.try_recv() {
                    firings.push(more);
                }
                // Mirror the one-shot delivery contract.
                let mut registry = self.registry.lock();
                for (token, _) in firings.iter() {
                    if let Some(w) = registry.io.get_mut(token) {
                        w.2 = false;
                    }
                    if let Some(w) = registry.timers.get_mut(token) {
                        w.1 = false;
                    }
                    if let Some(w) = registry.signals.get_mut(token) {
                        w.1 = false;
                    }
                }
                Ok(LoopOutcome::Normal)
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(LoopOutcome::Normal),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Ok(LoopOutcome::NoEvents),
        }
    }
}
