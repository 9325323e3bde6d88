// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ns-adapters: uniform interface over the OS readiness multiplexer.
//!
//! The dispatcher core talks to one [`EventAdapter`]; which multiplexer backs
//! it is invisible from the outside. [`PollAdapter`] is the production
//! implementation over `poll(2)`; a `FakeAdapter` for other crates' tests is
//! available behind the `test-support` feature.

pub mod event;
pub mod poll;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use event::{EventAdapter, Fired, LoopOutcome, Token};
pub use poll::PollAdapter;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAdapter, FakeControl};
