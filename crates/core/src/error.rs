// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher result codes.

/// Errors returned by the dispatcher.
///
/// Submission errors are returned synchronously and have no side effect;
/// failures during dispatch are logged and confined to the affected watcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Illegal trigger combination or malformed argument.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// The request cannot be honored in the job's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Out of resources while creating a job, pipe, or adapter watcher.
    #[error("resource allocation failed")]
    Allocation(#[source] std::io::Error),

    /// The pool is shutting down; no new submissions are accepted.
    #[error("dispatcher is shutting down")]
    Shutdown,

    /// A worker thread could not be spawned or joined cleanly.
    #[error("worker thread failure")]
    ThreadFailure,

    /// The underlying readiness multiplexer reported an error.
    #[error("event framework error")]
    Adapter(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
