// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread-pool facade: construction, submission, shutdown, join, teardown.

use crate::dispatch;
use crate::events::EventThread;
use crate::job::{Job, JobCallback, JobCore, JobSpec, UserData};
use crate::worker;
use ns_adapters::{EventAdapter, PollAdapter, Token};
use ns_core::{Error, JobState, JobType, Logger, PoolConfig, Priority, Result, Timeout};
use nix::fcntl::OFlag;
use nix::sys::signal::Signal;
use nix::unistd::pipe2;
use parking_lot::Mutex;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

/// State shared by the facade, the event thread, the workers, and every job.
pub(crate) struct PoolShared {
    pub(crate) logger: Arc<dyn Logger>,
    /// Refuses new submissions; workers exit once their shutdown job arrives.
    shutdown: AtomicBool,
    /// Tells the event thread to return; set only by teardown.
    shutdown_event: AtomicBool,
    next_id: AtomicU64,
    pub(crate) worker_count: usize,
    pub(crate) event_tx: crossbeam_channel::Sender<Arc<JobCore>>,
    pub(crate) event_rx: crossbeam_channel::Receiver<Arc<JobCore>>,
    pub(crate) work_tx: crossbeam_channel::Sender<Arc<JobCore>>,
    pub(crate) work_rx: crossbeam_channel::Receiver<Arc<JobCore>>,
    pub(crate) wakeup_write: OwnedFd,
    /// Held here so teardown can route its deletion through the event queue;
    /// taken out at that point to break the record/pool reference cycle.
    pub(crate) wakeup_job: Mutex<Option<Arc<JobCore>>>,
    pub(crate) event_thread_id: OnceLock<ThreadId>,
}

impl PoolShared {
    pub(crate) fn log(&self, priority: Priority, message: &str) {
        self.logger.log(priority, message);
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn is_event_shutdown(&self) -> bool {
        self.shutdown_event.load(Ordering::Acquire)
    }

    pub(crate) fn next_token(&self) -> Token {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn on_event_thread(&self) -> bool {
        self.event_thread_id.get() == Some(&thread::current().id())
    }
}

/// Cloneable submission surface, also reachable from inside callbacks via
/// [`Job::pool`].
#[derive(Clone)]
pub struct PoolHandle {
    pub(crate) shared: Arc<PoolShared>,
}

impl PoolHandle {
    pub(crate) fn from_shared(shared: Arc<PoolShared>) -> Self {
        PoolHandle { shared }
    }

    /// Allocate a job without arming it; the caller arms it later with
    /// [`Job::rearm`].
    pub fn create_job(
        &self,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
    ) -> Result<Job> {
        self.check_submission(job_type)?;
        if self.shared.is_shutdown() {
            return Err(Error::Shutdown);
        }
        let core = JobCore::create(
            Arc::clone(&self.shared),
            JobSpec::new(job_type, Some(Arc::new(cb))),
        );
        Ok(core.handle())
    }

    /// Submit an immediate job: it fires once, as soon as the dispatcher
    /// reaches it.
    pub fn add_job(
        &self,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
        data: Option<UserData>,
    ) -> Result<Job> {
        self.check_submission(job_type)?;
        let mut spec = JobSpec::new(job_type, Some(Arc::new(cb)));
        spec.data = data;
        self.submit(spec)
    }

    /// Submit an fd-triggered job.
    pub fn add_io_job(
        &self,
        fd: OwnedFd,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
        data: Option<UserData>,
    ) -> Result<Job> {
        self.check_submission(job_type)?;
        let mut spec = JobSpec::new(job_type, Some(Arc::new(cb)));
        spec.fd = Some(fd);
        spec.data = data;
        self.submit(spec)
    }

    /// Submit a timer job; fires once `timeout` elapses.
    pub fn add_timeout_job(
        &self,
        timeout: Timeout,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
        data: Option<UserData>,
    ) -> Result<Job> {
        timeout.validate()?;
        let job_type = job_type | JobType::TIMER;
        job_type.validate_submission()?;
        let mut spec = JobSpec::new(job_type, Some(Arc::new(cb)));
        spec.timeout = Some(timeout);
        spec.data = data;
        self.submit(spec)
    }

    /// Submit an fd-triggered job with a deadline: whichever of readiness or
    /// expiry happens first fires, never both in one cycle.
    pub fn add_io_timeout_job(
        &self,
        fd: OwnedFd,
        timeout: Timeout,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
        data: Option<UserData>,
    ) -> Result<Job> {
        timeout.validate()?;
        let job_type = job_type | JobType::TIMER;
        job_type.validate_submission()?;
        let mut spec = JobSpec::new(job_type, Some(Arc::new(cb)));
        spec.fd = Some(fd);
        spec.timeout = Some(timeout);
        spec.data = data;
        self.submit(spec)
    }

    /// Submit a signal-triggered job. A signal delivered before the watcher
    /// is armed is lost; signals are not queued.
    pub fn add_signal_job(
        &self,
        signal: Signal,
        job_type: JobType,
        cb: impl Fn(&Job) + Send + Sync + 'static,
        data: Option<UserData>,
    ) -> Result<Job> {
        let job_type = job_type | JobType::SIGNAL;
        job_type.validate_submission()?;
        let mut spec = JobSpec::new(job_type, Some(Arc::new(cb)));
        spec.signal = Some(signal);
        spec.data = data;
        self.submit(spec)
    }

    /// Begin worker shutdown: no new submissions are accepted, every queued
    /// job still runs, and each worker exits once it dequeues its shutdown
    /// notice. Idempotent. Must not be called from the event thread.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.on_event_thread() {
            shared.log(
                Priority::Error,
                "shutdown requested from the event thread; this can deadlock",
            );
        }
        if shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.log(Priority::Info, "shutting down worker pool");
        for _ in 0..shared.worker_count {
            let core = JobCore::create(
                Arc::clone(shared),
                JobSpec::new(JobType::SHUTDOWN_WORKER, None),
            );
            {
                let mut inner = core.inner.lock();
                core.transition(&mut inner, JobState::NeedsArm);
            }
            dispatch::arm(&core);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    fn check_submission(&self, job_type: JobType) -> Result<()> {
        job_type.validate_submission()?;
        if job_type.is_timer() {
            // Only the *_timeout_job entry points carry a timeout.
            return Err(Error::InvalidRequest("TIMER requires a timeout"));
        }
        if job_type.is_signal() {
            return Err(Error::InvalidRequest("SIGNAL requires a signal number"));
        }
        Ok(())
    }

    fn submit(&self, spec: JobSpec) -> Result<Job> {
        if self.shared.is_shutdown() {
            return Err(Error::Shutdown);
        }
        let core = JobCore::create(Arc::clone(&self.shared), spec);
        {
            let mut inner = core.inner.lock();
            core.transition(&mut inner, JobState::NeedsArm);
        }
        dispatch::arm(&core);
        Ok(core.handle())
    }
}

/// The dispatcher. One event thread, `max_threads` workers.
///
/// Dereferences to [`PoolHandle`] for submission and shutdown; [`wait`]
/// joins the workers and [`destroy`] (or drop) tears the whole pool down.
///
/// [`wait`]: ThreadPool::wait
/// [`destroy`]: ThreadPool::destroy
pub struct ThreadPool {
    handle: PoolHandle,
    workers: Mutex<Vec<JoinHandle<()>>>,
    event_thread: Option<JoinHandle<()>>,
}

impl std::ops::Deref for ThreadPool {
    type Target = PoolHandle;

    fn deref(&self) -> &PoolHandle {
        &self.handle
    }
}

impl ThreadPool {
    /// Build a pool from a validated config with the `poll(2)` adapter.
    pub fn new(config: PoolConfig) -> Result<ThreadPool> {
        let adapter = Box::new(PollAdapter::new(Arc::clone(&config.logger)));
        Self::with_adapter(config, adapter)
    }

    /// Build a pool over a caller-supplied adapter.
    pub fn with_adapter(config: PoolConfig, adapter: Box<dyn EventAdapter>) -> Result<ThreadPool> {
        config.validate()?;
        let logger = Arc::clone(&config.logger);
        logger.start();

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (work_tx, work_rx) = crossbeam_channel::unbounded();
        let (wakeup_read, wakeup_write) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(|e| Error::Allocation(e.into()))?;

        let shared = Arc::new(PoolShared {
            logger,
            shutdown: AtomicBool::new(false),
            shutdown_event: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            worker_count: config.max_threads,
            event_tx,
            event_rx,
            work_tx,
            work_rx,
            wakeup_write,
            wakeup_job: Mutex::new(None),
            event_thread_id: OnceLock::new(),
        });
        shared.log(
            Priority::Debug,
            &format!(
                "new pool: {} worker threads, stacksize {}",
                config.max_threads, config.stacksize
            ),
        );

        let mut event_thread = EventThread::new(Arc::clone(&shared), adapter);
        let wakeup_job = Self::make_wakeup_job(&shared, wakeup_read);
        event_thread.register_wakeup(&wakeup_job)?;
        *shared.wakeup_job.lock() = Some(wakeup_job);

        let mut pool = ThreadPool {
            handle: PoolHandle::from_shared(Arc::clone(&shared)),
            workers: Mutex::new(Vec::with_capacity(config.max_threads)),
            event_thread: None,
        };

        let mut builder = thread::Builder::new().name("ns-event".into());
        if config.stacksize > 0 {
            builder = builder.stack_size(config.stacksize);
        }
        pool.event_thread = Some(
            builder
                .spawn(move || event_thread.run())
                .map_err(|_| Error::ThreadFailure)?,
        );

        for i in 0..config.max_threads {
            let mut builder = thread::Builder::new().name(format!("ns-worker-{i}"));
            if config.stacksize > 0 {
                builder = builder.stack_size(config.stacksize);
            }
            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || worker::worker_loop(worker_shared)) {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(_) => {
                    // Unwind what already started; Drop finishes the teardown.
                    pool.handle.shutdown();
                    return Err(Error::ThreadFailure);
                }
            }
        }

        Ok(pool)
    }

    /// The self-pipe read side as a persistent internal read job; its
    /// callback just drains whatever bytes accumulated. The job owns the
    /// read end, so its teardown is what closes it.
    fn make_wakeup_job(shared: &Arc<PoolShared>, wakeup_read: OwnedFd) -> Arc<JobCore> {
        let callback: JobCallback = Arc::new(|job: &Job| {
            if let Some(fd) = job.fd() {
                let mut buf = [0u8; 32];
                while let Ok(n) = nix::unistd::read(fd, &mut buf) {
                    if n < buf.len() {
                        break;
                    }
                }
            }
        });
        let mut spec = JobSpec::new(JobType::READ | JobType::PERSIST, Some(callback));
        spec.fd = Some(wakeup_read);
        JobCore::create(Arc::clone(shared), spec)
    }

    /// Cloneable submission handle.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Join every worker. Success only if all of them exited cleanly.
    pub fn wait(&self) -> Result<()> {
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let mut result = Ok(());
        for handle in handles {
            if handle.join().is_err() {
                self.handle.shared.log(Priority::Error, "a worker thread panicked");
                result = Err(Error::ThreadFailure);
            }
        }
        result
    }

    /// Tear the pool down: stop and join the event thread, finalize anything
    /// still queued, release the self-pipe and the adapter. Implies
    /// `shutdown` and `wait` if the caller skipped them.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(event_thread) = self.event_thread.take() else {
            return;
        };
        let shared = Arc::clone(&self.handle.shared);

        if !shared.is_shutdown() {
            self.handle.shutdown();
        }
        let _ = self.wait();

        shared.shutdown_event.store(true, Ordering::Release);
        let wakeup = shared.wakeup_job.lock().take();
        match wakeup {
            Some(job) => {
                {
                    let mut inner = job.inner.lock();
                    job.transition(&mut inner, JobState::NeedsDelete);
                }
                shared.event_q_notify(job);
            }
            None => shared.wake(),
        }
        if event_thread.join().is_err() {
            shared.log(Priority::Error, "event thread panicked during teardown");
        }

        // Anything still sitting in a queue is finalized here so done
        // callbacks run exactly once even for jobs the loops never reached.
        while let Ok(job) = shared.event_rx.try_recv() {
            dispatch::finalize_stranded(&job);
        }
        while let Ok(job) = shared.work_rx.try_recv() {
            dispatch::finalize_stranded(&job);
        }

        shared.logger.close();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
