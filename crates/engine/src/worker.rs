// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker threads.
//!
//! Each worker blocks on the work queue and executes whatever job it
//! dequeues to completion. Workers never touch the adapter: a callback that
//! re-arms routes back through the event queue. A dequeued SHUTDOWN_WORKER
//! job is consumed and ends the worker.

use crate::dispatch;
use crate::pool::PoolShared;
use ns_core::{JobState, Priority};
use std::sync::Arc;

pub(crate) fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let Ok(job) = shared.work_rx.recv() else {
            // Queue gone; the pool is being torn down.
            break;
        };

        let is_shutdown_notice = job.inner.lock().job_type.is_shutdown_worker();
        if is_shutdown_notice {
            shared.log(Priority::Info, "worker received shutdown notice");
            {
                let mut inner = job.inner.lock();
                job.transition(&mut inner, JobState::NeedsDelete);
            }
            dispatch::finalize_local(&job);
            break;
        }

        dispatch::execute(&job);
        // The job may already be gone; nothing may touch it here.
    }

    shared.log(Priority::Debug, "worker exiting");
}
