// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! The scheduler compares epoch-millisecond timestamps for progress
//! freshness, orphan staleness, and auto-delete cutoffs, so the trait is
//! object-safe and epoch-first: `now()` is derived where a monotonic
//! reference is wanted.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Controllable clock for tests. Clones share the same underlying time, so a
/// clock handed to a store and a server can be advanced from the test body.
#[derive(Clone)]
pub struct FakeClock {
    base: Instant,
    /// Milliseconds advanced past the base instant / base epoch.
    offset_ms: Arc<Mutex<u64>>,
    base_epoch_ms: u64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(Mutex::new(0)),
            base_epoch_ms: 1_000_000,
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.offset_ms.lock() += duration.as_millis() as u64;
    }

    /// Pin the epoch to a specific millisecond value (resets the offset).
    pub fn set_epoch_ms(&self, ms: u64) {
        let mut offset = self.offset_ms.lock();
        *offset = ms.saturating_sub(self.base_epoch_ms);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(*self.offset_ms.lock())
    }

    fn epoch_ms(&self) -> u64 {
        self.base_epoch_ms + *self.offset_ms.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
