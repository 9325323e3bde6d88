// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal job specs. These touch process-global signal handlers, so they run
//! serially.

use crate::prelude::*;
use nix::sys::signal::raise;
use serial_test::serial;

#[test]
#[serial]
fn signal_job_fires_on_raised_signal() {
    let pool = pool(4);
    let (counter, seen) = counter();

    let job = pool
        .add_signal_job(
            Signal::SIGUSR1,
            JobType::THREAD,
            move |job| {
                assert_eq!(job.output_type(), JobType::SIGNAL);
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    // Let the registration reach the event thread and settle.
    std::thread::sleep(Duration::from_millis(300));
    raise(Signal::SIGUSR1).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));

    done_when_possible(&job);
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));
}

#[test]
#[serial]
fn persistent_signal_job_fires_per_delivery() {
    let pool = pool(2);
    let (counter, seen) = counter();

    let job = pool
        .add_signal_job(
            Signal::SIGUSR1,
            JobType::PERSIST | JobType::THREAD,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(300));
    for expected in 1..=2usize {
        raise(Signal::SIGUSR1).unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            counter.load(Ordering::SeqCst) == expected
        }));
    }

    // A persistent job re-arms itself, so it can only be removed from its
    // own callback or by pool teardown; teardown handles this one.
    drop(job);
    pool.destroy();
}

#[test]
#[serial]
fn signal_job_reads_its_signal_number() {
    let pool = pool(1);
    let job = pool
        .add_signal_job(Signal::SIGUSR2, JobType::THREAD, |_| {}, None)
        .unwrap();
    assert_eq!(job.signal(), Some(Signal::SIGUSR2));
    // Armed and never fired; teardown reaps it.
    pool.destroy();
    assert_eq!(job.state(), JobState::Deleted);
}
