// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rota-storage: the storage contract every backend implements, plus the
//! in-memory reference backend.
//!
//! Storage is the single shared, durable surface between server instances.
//! The engine is backend-agnostic: it only ever talks to [`JobStore`], and
//! the contract's atomicity obligations (claim is compare-and-set, terminal
//! writes clear ownership) are what make multi-instance scheduling safe.

pub mod contract;
pub mod memory;

use rota_core::{Clock, StorageMode};
use std::sync::Arc;

pub use contract::{JobStatusCount, JobStore, JobView, JobViewPage, StorageError};
pub use memory::MemoryStore;

/// Open a store for the configured mode.
///
/// Explicit construction, selected once at process start; the engine never
/// branches on backend type after this point.
pub fn open_store<C: Clock + 'static>(mode: StorageMode, clock: C) -> Arc<dyn JobStore> {
    match mode {
        StorageMode::Memory => Arc::new(MemoryStore::new(clock)),
    }
}
