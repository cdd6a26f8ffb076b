// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rota-engine: the scheduling and execution engine.
//!
//! One [`JobServer`] per process runs two independent cycles against the
//! shared store — claim & dispatch, and housekeeping — and executes claimed
//! jobs on a bounded worker pool with cooperative cancellation. The
//! [`JobClient`] is the public operation surface for submitting jobs and
//! issuing control commands.

pub mod cache;
pub mod client;
pub mod executor;
pub mod handler;
pub mod server;

pub use cache::ProgressCache;
pub use client::JobClient;
pub use executor::Executor;
pub use handler::{Checkpoint, HandlerRegistry, JobContext, JobFailure, JobHandler, Outcome};
pub use server::{JobServer, ServerError};
