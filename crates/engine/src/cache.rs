// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process write-back cache for job progress.
//!
//! Progress reports can be very chatty; the cache absorbs them in memory
//! and writes through to storage at most once per flush interval per job.
//! Terminal progress is always flushed — a final snapshot must never exist
//! only in memory. The cache is exclusive to one server process; cross-
//! process readers see whatever the last flush made durable.

use parking_lot::Mutex;
use rota_core::{Clock, JobId, JobProgress};
use rota_storage::{JobStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct CacheEntry {
    progress: JobProgress,
    /// Epoch ms of the last durable write for this job; 0 before the first.
    last_flush_ms: u64,
}

pub struct ProgressCache {
    entries: Mutex<HashMap<JobId, CacheEntry>>,
    flush_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl ProgressCache {
    pub fn new(flush_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), flush_interval, clock }
    }

    /// Record a progress report. The entry is visible to local reads
    /// immediately; it is written through when the flush interval has
    /// elapsed since the last durable write (the first report always
    /// flushes, establishing the durable row).
    pub async fn report(
        &self,
        store: &dyn JobStore,
        id: &JobId,
        progress: JobProgress,
    ) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let interval_ms = self.flush_interval.as_millis() as u64;

        let due = {
            let mut entries = self.entries.lock();
            let entry = entries
                .entry(id.clone())
                .and_modify(|e| e.progress = progress.clone())
                .or_insert(CacheEntry { progress: progress.clone(), last_flush_ms: 0 });
            now.saturating_sub(entry.last_flush_ms) >= interval_ms
        };

        if due {
            store.update_progress(id, progress).await?;
            if let Some(entry) = self.entries.lock().get_mut(id) {
                entry.last_flush_ms = now;
            }
        }
        Ok(())
    }

    /// Write the final snapshot through unconditionally and evict the
    /// entry. Called on every terminal path before the worker slot is
    /// released.
    pub async fn flush_final(
        &self,
        store: &dyn JobStore,
        id: &JobId,
        progress: JobProgress,
    ) -> Result<(), StorageError> {
        store.update_progress(id, progress).await?;
        self.entries.lock().remove(id);
        Ok(())
    }

    /// Latest progress for a job: the cache entry when it is no older than
    /// the flush interval, otherwise the durable copy.
    pub async fn get(
        &self,
        store: &dyn JobStore,
        id: &JobId,
    ) -> Result<Option<JobProgress>, StorageError> {
        let now = self.clock.epoch_ms();
        let interval_ms = self.flush_interval.as_millis() as u64;
        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(id) {
                if now.saturating_sub(entry.progress.updated_at_ms) <= interval_ms {
                    return Ok(Some(entry.progress.clone()));
                }
            }
        }
        store.get_progress(id).await
    }

    /// Most recent locally reported progress, if any. Used when finalizing
    /// so the durable snapshot keeps the invocation's last note and data.
    pub fn latest(&self, id: &JobId) -> Option<JobProgress> {
        self.entries.lock().get(id).map(|e| e.progress.clone())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
