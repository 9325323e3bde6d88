// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer specs: firing windows, persistence, and timeout validation.

use crate::prelude::*;

#[test]
fn timer_fires_inside_its_window() {
    let pool = pool(2);
    let (counter, seen) = counter();

    let job = pool
        .add_timeout_job(
            Timeout::new(0, 600_000),
            JobType::THREAD,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    // Well before the deadline, nothing has fired.
    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    // Well after it, exactly one firing.
    assert!(wait_until(Duration::from_secs(2), || {
        counter.load(Ordering::SeqCst) == 1
    }));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    done_when_possible(&job);
}

#[test]
fn zero_timeout_fires_on_the_next_cycle() {
    let pool = pool(2);
    let (counter, seen) = counter();

    let job = pool
        .add_timeout_job(
            Timeout::ZERO,
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
    done_when_possible(&job);
}

#[test]
fn negative_timeout_is_rejected() {
    let pool = pool(1);
    for timeout in [Timeout::new(-1, 0), Timeout::new(0, -1)] {
        let result = pool.add_timeout_job(timeout, JobType::THREAD, |_| {}, None);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}

#[test]
fn timer_bit_without_timeout_is_rejected() {
    let pool = pool(1);
    let result = pool.add_job(JobType::TIMER | JobType::THREAD, |_| {}, None);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn persistent_timer_fires_repeatedly_until_done() {
    let pool = pool(2);
    let (counter, seen) = counter();

    let job = pool
        .add_timeout_job(
            Timeout::new(0, 100_000),
            JobType::PERSIST | JobType::THREAD,
            move |job| {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 5 {
                    let _ = job.done();
                }
            },
            None,
        )
        .unwrap();

    let started = Instant::now();
    assert!(wait_until(Duration::from_secs(5), || {
        counter.load(Ordering::SeqCst) >= 5
    }));
    // Five 100ms periods cannot complete instantly.
    assert!(started.elapsed() >= Duration::from_millis(400));

    assert!(wait_until(Duration::from_secs(2), || {
        job.state() == JobState::Deleted
    }));
    // The callback marked it done; the count stays put.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn output_type_is_timer_for_a_timer_firing() {
    let pool = pool(2);
    let seen = Arc::new(std::sync::Mutex::new(JobType::NONE));
    let seen_in_cb = Arc::clone(&seen);

    let job = pool
        .add_timeout_job(
            Timeout::new(0, 20_000),
            JobType::THREAD,
            move |job| {
                *seen_in_cb.lock().unwrap() = job.output_type();
            },
            None,
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        *seen.lock().unwrap() == JobType::TIMER
    }));
    done_when_possible(&job);
}
