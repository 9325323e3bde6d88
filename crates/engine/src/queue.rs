// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue notification and the self-pipe wakeup.
//!
//! The event queue has many producers and one consumer (the event thread);
//! the work queue has many producers and the workers as consumers. Channel
//! enqueue/dequeue gives the happens-before edge the job record relies on:
//! everything written before the send is visible after the receive. Workers
//! block inside `recv()` when the work queue is empty; every send wakes one.

use crate::job::JobCore;
use crate::pool::PoolShared;
use ns_core::{JobState, Priority};
use std::sync::Arc;

impl PoolShared {
    /// Hand a job to the event thread. Once sent, the job may be torn down
    /// by the event thread at any moment; it must not be touched afterwards.
    /// Off the event thread, a wake byte follows the enqueue so a blocked
    /// multiplexer cycle notices; on it, the loop drains the queue before
    /// its next cycle anyway.
    pub(crate) fn event_q_notify(&self, job: Arc<JobCore>) {
        let _ = self.event_tx.send(job);
        if !self.on_event_thread() {
            self.wake();
        }
    }

    /// Hand an armed job to the workers.
    pub(crate) fn work_q_notify(&self, job: Arc<JobCore>) {
        {
            let inner = job.inner.lock();
            if inner.state != JobState::Armed {
                self.log(
                    Priority::Error,
                    &format!("job {} is {}, not armed; refusing to queue", job.id, inner.state),
                );
                return;
            }
        }
        let _ = self.work_tx.send(job);
    }

    /// Wake the event thread out of its multiplexer wait. One byte, content
    /// ignored; a full pipe means a wakeup is already pending.
    pub(crate) fn wake(&self) {
        match nix::unistd::write(&self.wakeup_write, b"a") {
            Ok(_) => {}
            Err(nix::errno::Errno::EAGAIN) => {}
            Err(e) => {
                self.log(Priority::Error, &format!("could not write wakeup pipe: {e}"));
            }
        }
    }
}
