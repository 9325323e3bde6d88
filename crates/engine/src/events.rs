// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event thread.
//!
//! Exactly one per pool. It owns the adapter and the registry of armed event
//! jobs; every watcher registration and release happens here and nowhere
//! else. Loop body: drain the event queue, run one multiplexer cycle,
//! dispatch what fired, check the shutdown-event flag.

use crate::dispatch;
use crate::job::{JobCore, JobInner};
use crate::pool::PoolShared;
use ns_adapters::{EventAdapter, Fired, Token};
use ns_core::{Error, JobState, JobType, Priority, Result};
use std::collections::HashMap;
use std::os::fd::AsFd;
use std::sync::Arc;
use std::thread;

pub(crate) struct EventThread {
    shared: Arc<PoolShared>,
    adapter: Box<dyn EventAdapter>,
    /// Armed event jobs, keyed by their adapter token. Holding the reference
    /// here is what "the adapter level owns the job" means; entries leave
    /// only at teardown.
    registry: HashMap<Token, Arc<JobCore>>,
}

impl EventThread {
    pub(crate) fn new(shared: Arc<PoolShared>, adapter: Box<dyn EventAdapter>) -> EventThread {
        EventThread {
            shared,
            adapter,
            registry: HashMap::new(),
        }
    }

    /// Register the self-pipe read job. Runs before the thread starts, while
    /// the pool is still single-threaded.
    pub(crate) fn register_wakeup(&mut self, job: &Arc<JobCore>) -> Result<()> {
        let mut inner = job.inner.lock();
        job.transition(&mut inner, JobState::NeedsArm);
        job.transition(&mut inner, JobState::Armed);
        let fd = inner
            .fd
            .as_ref()
            .ok_or(Error::InvalidRequest("wakeup job has no fd"))?;
        self.adapter.add_io(job.id, fd.as_fd(), inner.job_type, None)?;
        inner.watchers.io = true;
        drop(inner);
        self.registry.insert(job.id, Arc::clone(job));
        Ok(())
    }

    pub(crate) fn run(mut self) {
        let _ = self.shared.event_thread_id.set(thread::current().id());
        self.shared.log(Priority::Debug, "event thread started");

        let mut firings: Vec<(Token, Fired)> = Vec::new();
        while !self.shared.is_event_shutdown() {
            self.drain_requests();

            firings.clear();
            if let Err(e) = self.adapter.poll_once(&mut firings) {
                self.shared
                    .log(Priority::Error, &format!("event framework cycle failed: {e}"));
            }
            for (token, fired) in firings.drain(..) {
                self.dispatch(token, fired);
            }
        }

        // Jobs still armed when the loop stops are forcibly deleted so their
        // teardown (and done callback) happens exactly once, here.
        let remaining: Vec<Arc<JobCore>> = self.registry.drain().map(|(_, job)| job).collect();
        for job in remaining {
            let mut inner = job.inner.lock();
            if inner.state == JobState::Armed || inner.state == JobState::Waiting {
                job.transition(&mut inner, JobState::NeedsDelete);
            }
            if inner.state == JobState::NeedsDelete {
                self.release_watchers(job.id, &mut inner);
                drop(inner);
                dispatch::finalize_local(&job);
            }
        }

        self.shared.log(Priority::Debug, "event thread exiting");
    }

    /// Pull pending registrations and removals off the event queue.
    fn drain_requests(&mut self) {
        while let Ok(job) = self.shared.event_rx.try_recv() {
            self.update_event(job);
        }
    }

    /// Apply one dequeued job to the adapter according to its state.
    fn update_event(&mut self, job: Arc<JobCore>) {
        let lock_handle = Arc::clone(&job);
        let mut inner = lock_handle.inner.lock();
        match inner.state {
            JobState::NeedsDelete => {
                self.release_watchers(job.id, &mut inner);
                drop(inner);
                self.registry.remove(&job.id);
                dispatch::finalize_local(&job);
            }
            JobState::Armed => self.register(job, inner),
            JobState::Deleted => {
                // A job can be queued for teardown from two sides at once;
                // the second request finds it already gone.
            }
            state => {
                self.shared.log(
                    Priority::Error,
                    &format!("job {} dequeued in unexpected state {state}", job.id),
                );
            }
        }
    }

    /// Register or re-register an armed job's watcher, or route a watcherless
    /// job to where it runs.
    fn register(&mut self, job: Arc<JobCore>, mut inner: parking_lot::MutexGuard<'_, JobInner>) {
        let ty = inner.job_type;
        let token = job.id;

        let outcome = if ty.is_io() || inner.watchers.io {
            let deadline = if ty.is_timer() { inner.timeout } else { None };
            let result = if inner.watchers.io {
                self.adapter.mod_io(token, ty, deadline)
            } else {
                match inner.fd.as_ref() {
                    Some(fd) => self.adapter.add_io(token, fd.as_fd(), ty, deadline),
                    None => Err(Error::InvalidRequest("io job without an fd")),
                }
            };
            result.map(|()| inner.watchers.io = true)
        } else if ty.is_timer() || inner.watchers.timer {
            let timeout = inner.timeout.unwrap_or_default();
            let result = if inner.watchers.timer {
                self.adapter.mod_timer(token, timeout)
            } else {
                self.adapter.add_timer(token, timeout)
            };
            result.map(|()| inner.watchers.timer = true)
        } else if ty.is_signal() || inner.watchers.signal {
            let result = if inner.watchers.signal {
                self.adapter.mod_signal(token)
            } else {
                match inner.signal {
                    Some(signal) => self.adapter.add_signal(token, signal),
                    None => Err(Error::InvalidRequest("signal job without a signal number")),
                }
            };
            result.map(|()| inner.watchers.signal = true)
        } else if ty.is_threaded() || ty.is_shutdown_worker() {
            drop(inner);
            self.shared.work_q_notify(job);
            return;
        } else {
            // Immediate non-threaded job: runs right here, inline.
            drop(inner);
            dispatch::execute(&job);
            return;
        };

        match outcome {
            Ok(()) => {
                drop(inner);
                self.registry.insert(token, job);
            }
            Err(e) => {
                // The watcher is unusable; tear the job down rather than
                // leave it armed with nothing behind it.
                self.shared.log(
                    Priority::Error,
                    &format!("job {token}: watcher registration failed: {e}"),
                );
                job.transition(&mut inner, JobState::NeedsDelete);
                self.release_watchers(token, &mut inner);
                drop(inner);
                self.registry.remove(&token);
                dispatch::finalize_local(&job);
            }
        }
    }

    fn release_watchers(&mut self, token: Token, inner: &mut JobInner) {
        if inner.watchers.io {
            self.adapter.io_done(token);
            inner.watchers.io = false;
        }
        if inner.watchers.timer {
            self.adapter.timer_done(token);
            inner.watchers.timer = false;
        }
        if inner.watchers.signal {
            self.adapter.signal_done(token);
            inner.watchers.signal = false;
        }
    }

    /// One firing from the adapter: record the output trigger and either run
    /// the job inline or hand it to the workers.
    fn dispatch(&mut self, token: Token, fired: Fired) {
        let Some(job) = self.registry.get(&token).map(Arc::clone) else {
            // Torn down between the cycle and now; nothing to deliver to.
            return;
        };

        let output = match fired {
            Fired::Io { readable, writable } => {
                let mut out = JobType::NONE;
                if readable {
                    out |= JobType::READ;
                }
                if writable {
                    out |= JobType::WRITE;
                }
                out
            }
            Fired::Timer => JobType::TIMER,
            Fired::Signal(_) => JobType::SIGNAL,
        };

        let mut inner = job.inner.lock();
        match inner.state {
            JobState::Armed if inner.job_type.is_threaded() => {
                inner.output_type = output;
                drop(inner);
                self.shared.work_q_notify(job);
            }
            JobState::Armed => {
                inner.output_type = output;
                drop(inner);
                dispatch::execute(&job);
            }
            JobState::NeedsDelete => {
                // Queued for deletion; the firing is dropped on the floor.
            }
            state => {
                self.shared.log(
                    Priority::Debug,
                    &format!("job {token}: firing ignored in state {state}"),
                );
            }
        }
    }
}
