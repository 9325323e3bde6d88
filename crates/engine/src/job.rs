// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job record and its caller-facing handle.
//!
//! A [`Job`] is a cheap clone of a shared record. The record's monitor guards
//! every field; it is never held across the user callback. `Running`
//! ownership is enforced by recording the executing thread's id instead.
//! Queues and the event thread's armed registry hold their own clones, so the
//! record outlives whichever side lets go last; after teardown the state is
//! `Deleted` and every accessor refuses service.

use crate::dispatch;
use crate::pool::{PoolHandle, PoolShared};
use ns_adapters::Token;
use ns_core::{Error, JobState, JobType, Priority, Result, Timeout};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::any::Any;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// A job callback. Receives a handle to the job it belongs to, through which
/// it may read data, inspect the output trigger, re-arm, or mark done.
pub type JobCallback = Arc<dyn Fn(&Job) + Send + Sync + 'static>;

/// Opaque caller data carried by a job; the dispatcher never looks inside.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Which watcher kinds the job currently has registered with the adapter.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Watchers {
    pub(crate) io: bool,
    pub(crate) timer: bool,
    pub(crate) signal: bool,
}

impl Watchers {
    pub(crate) fn any(self) -> bool {
        self.io || self.timer || self.signal
    }
}

pub(crate) struct JobInner {
    pub(crate) state: JobState,
    pub(crate) job_type: JobType,
    /// Bits that actually fired at the most recent dispatch.
    pub(crate) output_type: JobType,
    /// None only for the internal worker-shutdown job.
    pub(crate) callback: Option<JobCallback>,
    pub(crate) done_cb: Option<JobCallback>,
    pub(crate) data: Option<UserData>,
    pub(crate) fd: Option<OwnedFd>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) signal: Option<Signal>,
    pub(crate) watchers: Watchers,
    /// Set while the callback executes; identifies the owning thread.
    pub(crate) running_thread: Option<ThreadId>,
}

pub(crate) struct JobCore {
    pub(crate) id: Token,
    pub(crate) pool: Arc<PoolShared>,
    pub(crate) inner: Mutex<JobInner>,
}

/// Everything needed to allocate a job record.
pub(crate) struct JobSpec {
    pub(crate) job_type: JobType,
    pub(crate) callback: Option<JobCallback>,
    pub(crate) data: Option<UserData>,
    pub(crate) fd: Option<OwnedFd>,
    pub(crate) timeout: Option<Timeout>,
    pub(crate) signal: Option<Signal>,
}

impl JobSpec {
    pub(crate) fn new(job_type: JobType, callback: Option<JobCallback>) -> Self {
        JobSpec {
            job_type,
            callback,
            data: None,
            fd: None,
            timeout: None,
            signal: None,
        }
    }
}

impl JobCore {
    pub(crate) fn create(pool: Arc<PoolShared>, spec: JobSpec) -> Arc<JobCore> {
        let id = pool.next_token();
        Arc::new(JobCore {
            id,
            pool,
            inner: Mutex::new(JobInner {
                state: JobState::Waiting,
                job_type: spec.job_type,
                output_type: JobType::NONE,
                callback: spec.callback,
                done_cb: None,
                data: spec.data,
                fd: spec.fd,
                timeout: spec.timeout.map(Timeout::to_duration),
                signal: spec.signal,
                watchers: Watchers::default(),
                running_thread: None,
            }),
        })
    }

    /// The one place state changes. An illegal edge is rejected and logged;
    /// internal callers are structured so this cannot happen.
    pub(crate) fn transition(&self, inner: &mut JobInner, next: JobState) -> bool {
        if !inner.state.can_transition(next) {
            self.pool.log(
                Priority::Error,
                &format!(
                    "job {}: illegal state transition {} -> {}",
                    self.id, inner.state, next
                ),
            );
            debug_assert!(false, "illegal job state transition");
            return false;
        }
        inner.state = next;
        true
    }

    pub(crate) fn handle(self: &Arc<Self>) -> Job {
        Job {
            core: Arc::clone(self),
        }
    }
}

/// Handle to a scheduled job.
#[derive(Clone)]
pub struct Job {
    pub(crate) core: Arc<JobCore>,
}

impl Job {
    /// Mark the job for teardown.
    ///
    /// From inside the job's own callback this is a synchronous intent: the
    /// executing thread finalizes the job after the callback returns. From
    /// anywhere else it is logical cancellation, honored by the event thread
    /// at the next opportunity. Calling it again once the job is already
    /// marked or deleted is a no-op success. An `Armed` job can only be
    /// removed while the pool is shutting down; otherwise `InvalidState` is
    /// returned and the caller must wait for the callback to start.
    pub fn done(&self) -> Result<()> {
        let core = &self.core;
        let shutting_down = core.pool.is_shutdown();

        let mut inner = core.inner.lock();
        match inner.state {
            JobState::NeedsDelete | JobState::Deleted => Ok(()),
            JobState::Armed if !shutting_down => {
                Err(Error::InvalidState("job is armed; wait for its callback"))
            }
            JobState::Running | JobState::NeedsArm => {
                // The executing thread observes the mark when the callback
                // returns and finalizes from there.
                core.transition(&mut inner, JobState::NeedsDelete);
                Ok(())
            }
            JobState::Waiting | JobState::Armed => {
                core.transition(&mut inner, JobState::NeedsDelete);
                drop(inner);
                core.pool.event_q_notify(Arc::clone(core));
                Ok(())
            }
        }
    }

    /// Re-arm the job so its trigger is registered again.
    ///
    /// Legal on a `Waiting` job from any thread, and from inside the callback
    /// of a non-persistent job (the arm happens when the callback returns).
    /// Persistent jobs re-arm themselves; asking again from their callback is
    /// `InvalidState`.
    pub fn rearm(&self) -> Result<()> {
        let core = &self.core;
        if core.pool.is_shutdown() {
            return Err(Error::Shutdown);
        }

        let mut inner = core.inner.lock();
        match inner.state {
            JobState::Waiting => {
                core.transition(&mut inner, JobState::NeedsArm);
                drop(inner);
                dispatch::arm(core);
                Ok(())
            }
            JobState::Running if !inner.job_type.is_persist() => {
                core.transition(&mut inner, JobState::NeedsArm);
                Ok(())
            }
            _ => Err(Error::InvalidState("job cannot be re-armed now")),
        }
    }

    /// The caller data, if any. `None` once the job is deleted.
    pub fn data(&self) -> Option<UserData> {
        let inner = self.core.inner.lock();
        if inner.state == JobState::Deleted {
            return None;
        }
        inner.data.clone()
    }

    /// Replace the caller data. Legal only while `Waiting` or `Running`.
    pub fn set_data(&self, data: UserData) -> Result<()> {
        let mut inner = self.core.inner.lock();
        match inner.state {
            JobState::Waiting | JobState::Running => {
                inner.data = Some(data);
                Ok(())
            }
            _ => Err(Error::InvalidState("data can only change while waiting or running")),
        }
    }

    /// Install the teardown callback, invoked exactly once after the job is
    /// deleted. Legal only while `Waiting` or `Running`.
    pub fn set_done_cb(&self, cb: impl Fn(&Job) + Send + Sync + 'static) -> Result<()> {
        let mut inner = self.core.inner.lock();
        match inner.state {
            JobState::Waiting | JobState::Running => {
                inner.done_cb = Some(Arc::new(cb));
                Ok(())
            }
            _ => Err(Error::InvalidState(
                "done callback can only change while waiting or running",
            )),
        }
    }

    /// The requested trigger set. `NONE` once the job is deleted.
    pub fn job_type(&self) -> JobType {
        let inner = self.core.inner.lock();
        if inner.state == JobState::Deleted {
            return JobType::NONE;
        }
        inner.job_type
    }

    /// The bits that fired for the current dispatch. Meaningful only while
    /// the callback is running; `NONE` otherwise.
    pub fn output_type(&self) -> JobType {
        let inner = self.core.inner.lock();
        if inner.state != JobState::Running {
            return JobType::NONE;
        }
        inner.output_type
    }

    /// The watched fd, if this is an I/O job and it has not been deleted.
    pub fn fd(&self) -> Option<RawFd> {
        let inner = self.core.inner.lock();
        if inner.state == JobState::Deleted {
            return None;
        }
        inner.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    /// The signal this job watches, if any.
    pub fn signal(&self) -> Option<Signal> {
        let inner = self.core.inner.lock();
        if inner.state == JobState::Deleted {
            return None;
        }
        inner.signal
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.core.inner.lock().state
    }

    /// Handle to the owning pool, usable from inside callbacks to submit
    /// further jobs or initiate shutdown.
    pub fn pool(&self) -> PoolHandle {
        PoolHandle::from_shared(Arc::clone(&self.core.pool))
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.inner.lock();
        f.debug_struct("Job")
            .field("id", &self.core.id)
            .field("state", &inner.state)
            .field("job_type", &format_args!("{}", inner.job_type))
            .field("running_thread", &inner.running_thread)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
