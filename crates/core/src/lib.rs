// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rota-core: data model, state machine, identity, and configuration for the
//! rota job scheduler.

pub mod macros;

pub mod clock;
pub mod config;
pub mod identity;
pub mod job;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use config::{ConfigError, ServerConfig, StorageMode};
pub use identity::{
    FileIdentityStore, IdentityError, IdentityProvider, IdentityStore, ProcessId,
};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Invocation, Job, JobCommand, JobConfig, JobId, JobProgress, JobStatus};
