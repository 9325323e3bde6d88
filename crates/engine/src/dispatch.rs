// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared job execution path.
//!
//! Workers and the event thread both funnel through [`execute`]; arming and
//! teardown live here too so every transition has exactly one home.

use crate::job::{JobCore, Watchers};
use ns_core::{JobState, Priority};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Take a `NeedsArm` job to `Armed` and route it: jobs with an event-kind
/// trigger go to the event queue, as do immediate non-threaded jobs (they
/// run inline on the event thread); THREAD-only jobs go straight to the
/// work queue.
pub(crate) fn arm(job: &Arc<JobCore>) {
    let job_type = {
        let mut inner = job.inner.lock();
        if inner.state != JobState::NeedsArm {
            job.pool.log(
                Priority::Error,
                &format!("job {}: arm requested in state {}", job.id, inner.state),
            );
            return;
        }
        job.transition(&mut inner, JobState::Armed);
        inner.job_type
    };

    if !job_type.has_event_trigger() && (job_type.is_threaded() || job_type.is_shutdown_worker()) {
        job.pool.work_q_notify(Arc::clone(job));
    } else {
        job.pool.event_q_notify(Arc::clone(job));
    }
}

/// Run a job's callback to completion and drive the after-callback
/// transition. The monitor is not held while the callback runs; `Running`
/// plus the recorded thread id is what keeps other threads out.
///
/// After this returns the job may already be gone; callers must not touch it.
pub(crate) fn execute(job: &Arc<JobCore>) {
    let handle = job.handle();
    let callback = {
        let mut inner = job.inner.lock();
        // A shutdown-time done() can mark the job between dequeue and here;
        // honor the mark instead of running.
        if inner.state == JobState::NeedsDelete {
            drop(inner);
            finalize(job);
            return;
        }
        job.transition(&mut inner, JobState::Running);
        inner.running_thread = Some(thread::current().id());
        inner.callback.clone()
    };

    let panicked = match callback {
        Some(cb) => catch_unwind(AssertUnwindSafe(|| cb(&handle))).is_err(),
        None => false,
    };

    let mut inner = job.inner.lock();
    inner.running_thread = None;

    if panicked {
        job.pool.log(
            Priority::Error,
            &format!("job {}: callback panicked; tearing the job down", job.id),
        );
        if matches!(inner.state, JobState::Running | JobState::NeedsArm) {
            job.transition(&mut inner, JobState::NeedsDelete);
        }
    }

    // Persistence re-arms automatically unless the callback asked for
    // deletion or re-armed explicitly.
    if inner.job_type.is_persist() && inner.state == JobState::Running {
        job.transition(&mut inner, JobState::NeedsArm);
    }

    match inner.state {
        JobState::NeedsDelete => {
            drop(inner);
            finalize(job);
        }
        JobState::NeedsArm => {
            drop(inner);
            arm(job);
        }
        JobState::Running => {
            job.transition(&mut inner, JobState::Waiting);
        }
        state => {
            job.pool.log(
                Priority::Error,
                &format!("job {}: callback finished in unexpected state {state}", job.id),
            );
        }
    }
}

/// Route a `NeedsDelete` job to its teardown site. Watcher registrations are
/// owned by the event thread, so a job holding any goes through the event
/// queue; everything else can be finalized right here.
pub(crate) fn finalize(job: &Arc<JobCore>) {
    let has_watchers = job.inner.lock().watchers.any();
    if has_watchers {
        job.pool.event_q_notify(Arc::clone(job));
    } else {
        finalize_local(job);
    }
}

/// Final teardown: `NeedsDelete -> Deleted`, close the fd unless the caller
/// keeps it, run the done callback exactly once. Any watcher registrations
/// must already be released.
pub(crate) fn finalize_local(job: &Arc<JobCore>) {
    let (done_cb, fd, preserve_fd) = {
        let mut inner = job.inner.lock();
        match inner.state {
            JobState::Deleted => return,
            JobState::NeedsDelete => {}
            state => {
                job.pool.log(
                    Priority::Error,
                    &format!("job {}: teardown requested in state {state}", job.id),
                );
                return;
            }
        }
        job.transition(&mut inner, JobState::Deleted);
        (
            inner.done_cb.take(),
            inner.fd.take(),
            inner.job_type.is_preserve_fd(),
        )
    };

    if let Some(fd) = fd {
        if preserve_fd {
            // The caller owns the descriptor; release without closing.
            let _ = std::os::fd::IntoRawFd::into_raw_fd(fd);
        }
    }

    if let Some(cb) = done_cb {
        let handle = job.handle();
        if catch_unwind(AssertUnwindSafe(|| cb(&handle))).is_err() {
            job.pool
                .log(Priority::Error, &format!("job {}: done callback panicked", job.id));
        }
    }
}

/// Teardown for jobs left in a queue after the loops have exited: force the
/// mark, forget watcher registrations (the adapter is already gone), and
/// finalize in place.
pub(crate) fn finalize_stranded(job: &Arc<JobCore>) {
    {
        let mut inner = job.inner.lock();
        match inner.state {
            JobState::Deleted => return,
            JobState::NeedsDelete => {}
            _ => {
                job.transition(&mut inner, JobState::NeedsDelete);
            }
        }
        inner.watchers = Watchers::default();
    }
    finalize_local(job);
}
