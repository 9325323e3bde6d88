// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! I/O readiness specs over real pipes, including combined fd+deadline jobs
//! and fd ownership at teardown.

use crate::prelude::*;
use nix::fcntl::OFlag;
use nix::unistd::{pipe2, write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

fn pipe_pair() -> (OwnedFd, OwnedFd) {
    pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).unwrap()
}

#[test]
fn read_job_fires_when_the_fd_becomes_readable() {
    let pool = pool(2);
    let (read, write_end) = pipe_pair();
    let (counter, seen) = counter();

    let job = pool
        .add_io_job(
            read,
            JobType::READ | JobType::THREAD,
            move |job| {
                // Drain the byte so a re-arm waits for fresh data.
                if let Some(fd) = job.fd() {
                    let mut buf = [0u8; 8];
                    let _ = nix::unistd::read(fd, &mut buf);
                }
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    // Nothing fires while the pipe is empty.
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    write(&write_end, b"x").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 1
    }));

    // Re-arm and deliver again.
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    job.rearm().unwrap();
    write(&write_end, b"y").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        counter.load(Ordering::SeqCst) == 2
    }));

    done_when_possible(&job);
}

#[test]
fn persistent_read_job_fires_per_write() {
    let pool = pool(2);
    let (read, write_end) = pipe_pair();
    let (counter, seen) = counter();

    let _job = pool
        .add_io_job(
            read,
            JobType::READ | JobType::PERSIST | JobType::THREAD,
            move |job| {
                if let Some(fd) = job.fd() {
                    let mut buf = [0u8; 8];
                    let _ = nix::unistd::read(fd, &mut buf);
                }
                seen.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    for expected in 1..=3usize {
        write(&write_end, b"x").unwrap();
        assert!(wait_until(Duration::from_secs(1), || {
            counter.load(Ordering::SeqCst) == expected
        }));
    }
}

#[test]
fn io_with_deadline_fires_exactly_one_side_timer_case() {
    let pool = pool(2);
    let (read, _write_end) = pipe_pair();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_cb = Arc::clone(&seen);

    let job = pool
        .add_io_timeout_job(
            read,
            Timeout::new(0, 100_000),
            JobType::READ | JobType::THREAD,
            move |job| {
                seen_in_cb.lock().unwrap().push(job.output_type());
            },
            None,
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        !seen.lock().unwrap().is_empty()
    }));
    std::thread::sleep(Duration::from_millis(200));
    let fired = seen.lock().unwrap().clone();
    assert_eq!(fired, vec![JobType::TIMER]);

    done_when_possible(&job);
}

#[test]
fn io_with_deadline_fires_exactly_one_side_io_case() {
    let pool = pool(2);
    let (read, write_end) = pipe_pair();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_cb = Arc::clone(&seen);

    let job = pool
        .add_io_timeout_job(
            read,
            Timeout::new(60, 0),
            JobType::READ | JobType::THREAD,
            move |job| {
                if let Some(fd) = job.fd() {
                    let mut buf = [0u8; 8];
                    let _ = nix::unistd::read(fd, &mut buf);
                }
                seen_in_cb.lock().unwrap().push(job.output_type());
            },
            None,
        )
        .unwrap();

    write(&write_end, b"x").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        !seen.lock().unwrap().is_empty()
    }));
    let fired = seen.lock().unwrap().clone();
    assert_eq!(fired, vec![JobType::READ]);

    done_when_possible(&job);
}

#[test]
fn teardown_closes_the_fd_by_default() {
    let pool = pool(1);
    let (read, write_end) = pipe_pair();

    let job = pool
        .add_io_job(
            read,
            JobType::READ | JobType::THREAD,
            |job| {
                if let Some(fd) = job.fd() {
                    let mut buf = [0u8; 8];
                    let _ = nix::unistd::read(fd, &mut buf);
                }
            },
            None,
        )
        .unwrap();
    // Trigger once so the job settles into waiting, then tear it down.
    write(&write_end, b"x").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    job.done().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));

    // Teardown dropped the last read end, so the pipe reports broken.
    assert_eq!(
        write(&write_end, b"y"),
        Err(nix::errno::Errno::EPIPE)
    );
}

#[test]
fn preserve_fd_leaves_the_fd_open() {
    let pool = pool(1);
    let (read, write_end) = pipe_pair();
    // Keep our own handle alive alongside the job's.
    let keep = read.as_fd().try_clone_to_owned().unwrap();

    let job = pool
        .add_io_job(
            read,
            JobType::READ | JobType::THREAD | JobType::PRESERVE_FD,
            |job| {
                if let Some(fd) = job.fd() {
                    let mut buf = [0u8; 8];
                    let _ = nix::unistd::read(fd, &mut buf);
                }
            },
            None,
        )
        .unwrap();

    write(&write_end, b"x").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Waiting
    }));
    job.done().unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        job.state() == JobState::Deleted
    }));

    // The descriptor is still usable through our clone.
    write(&write_end, b"y").unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(nix::unistd::read(keep.as_raw_fd(), &mut buf), Ok(1));
}
