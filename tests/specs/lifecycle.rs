// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle specs: immediate dispatch, data across re-arm, teardown
//! callbacks, and submission rules.

use crate::prelude::*;

#[test]
fn immediate_threaded_job_runs_once() {
    let pool = pool(4);
    let (counter, seen) = counter();

    let job = pool
        .add_job(
            JobType::THREAD,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // Once the callback has finished, the job settles and accepts done().
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    job.done().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));
}

#[test]
fn data_is_readable_and_replaceable_across_rearm() {
    let pool = pool(4);
    let (counter, seen) = counter();

    let job = pool
        .add_job(
            JobType::THREAD,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            Some(Arc::new("first".to_string())),
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    let data = job.data().unwrap();
    assert_eq!(data.downcast_ref::<String>().unwrap(), "first");

    job.set_data(Arc::new("second".to_string())).unwrap();
    job.rearm().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 2
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    let data = job.data().unwrap();
    assert_eq!(data.downcast_ref::<String>().unwrap(), "second");

    job.done().unwrap();
}

#[test]
fn done_cb_fires_exactly_once_on_disarm() {
    let pool = pool(4);
    let (counter, seen) = counter();

    let job = pool.create_job(JobType::THREAD, |_| {}).unwrap();
    job.set_done_cb(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    job.done().unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));
    // And never a second time.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn done_twice_is_idempotent() {
    let pool = pool(2);
    let job = pool.create_job(JobType::THREAD, |_| {}).unwrap();
    job.done().unwrap();
    job.done().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));
    job.done().unwrap();
}

#[test]
fn rearm_inside_persistent_callback_is_rejected() {
    let pool = pool(4);
    let (failures, seen) = counter();

    let job = pool
        .add_timeout_job(
            Timeout::new(0, 50_000),
            JobType::PERSIST | JobType::THREAD,
            move |job| {
                if matches!(job.rearm(), Err(Error::InvalidState(_))) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                // Stop after the first observation.
                let _ = job.done();
            },
            None,
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        failures.load(Ordering::SeqCst) >= 1
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        job.state() == JobState::Deleted
    }));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn accept_thread_submission_is_rejected() {
    let pool = pool(1);
    let result = pool.add_job(JobType::ACCEPT | JobType::THREAD, |_| {}, None);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn shutdown_worker_trigger_is_internal_only() {
    let pool = pool(1);
    let result = pool.add_job(JobType::SHUTDOWN_WORKER, |_| {}, None);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn submission_after_shutdown_is_rejected() {
    let pool = pool(2);
    pool.shutdown();
    assert!(matches!(
        pool.add_job(JobType::THREAD, |_| {}, None),
        Err(Error::Shutdown)
    ));
    pool.wait().unwrap();
}

#[test]
fn shutdown_twice_then_wait_then_destroy() {
    let pool = pool(3);
    pool.shutdown();
    pool.shutdown();
    pool.wait().unwrap();
    pool.destroy();
}

#[test]
fn rearm_then_callback_then_done_leaves_nothing_running() {
    let pool = pool(2);
    let (counter, seen) = counter();

    let job = pool.create_job(JobType::THREAD, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    job.rearm().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    job.done().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));

    pool.shutdown();
    pool.wait().unwrap();
    pool.destroy();
}
