// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool.
//!
//! Submission is fire-and-queue: a claimed job is spawned immediately and
//! waits on the slot semaphore if the pool is saturated — it is already
//! owned, so no other instance can re-claim it while it queues locally.
//! Every terminal path flushes final progress and clears ownership before
//! the slot is released.

use crate::cache::ProgressCache;
use crate::handler::{HandlerRegistry, JobContext, Outcome};
use futures_util::FutureExt;
use parking_lot::Mutex;
use rota_core::{Clock, Job, JobId, JobProgress, JobStatus};
use rota_storage::JobStore;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

pub struct Executor {
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn JobStore>,
    cache: Arc<ProgressCache>,
    clock: Arc<dyn Clock>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    /// Jobs claimed by this process and not yet finalized (queued locally
    /// or executing). Drives capacity math and shields live local jobs
    /// from the orphan sweep.
    active: Arc<Mutex<HashSet<JobId>>>,
    in_flight: Arc<AtomicUsize>,
}

impl Executor {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        store: Arc<dyn JobStore>,
        cache: Arc<ProgressCache>,
        clock: Arc<dyn Clock>,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            clock,
            slots: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            active: Arc::new(Mutex::new(HashSet::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of claimed-but-unfinalized jobs held by this process.
    pub fn running_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether a job is claimed by this process and still in flight.
    pub fn is_active(&self, id: &JobId) -> bool {
        self.active.lock().contains(id)
    }

    /// Hand a claimed job to the pool. Returns immediately.
    pub fn submit(&self, job: Job) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.active.lock().insert(job.id.clone());

        let registry = self.registry.clone();
        let store = self.store.clone();
        let cache = self.cache.clone();
        let clock = self.clock.clone();
        let slots = self.slots.clone();
        let active = self.active.clone();
        let in_flight = self.in_flight.clone();

        self.tracker.spawn(async move {
            // Slot wait is the local ready queue.
            let permit = slots.acquire_owned().await;
            if permit.is_ok() {
                run_one(&registry, &store, &cache, &clock, &job).await;
            }
            active.lock().remove(&job.id);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Wait for in-flight jobs to finish. Waits up to `delay`; when `force`
    /// is set, gives up after the delay and abandons the remainder (they
    /// stay owned until housekeeping reclaims them as orphans).
    pub async fn shutdown(&self, delay: Duration, force: bool) {
        self.tracker.close();
        if tokio::time::timeout(delay, self.tracker.wait()).await.is_ok() {
            return;
        }
        if force {
            tracing::warn!(
                abandoned = self.running_count(),
                "forced shutdown with jobs still in flight"
            );
        } else {
            self.tracker.wait().await;
        }
    }
}

/// Execute one claimed job through to a terminal (or paused) state.
async fn run_one(
    registry: &HandlerRegistry,
    store: &Arc<dyn JobStore>,
    cache: &Arc<ProgressCache>,
    clock: &Arc<dyn Clock>,
    job: &Job,
) {
    let id = &job.id;
    let target = &job.invocation.target;

    let Some(handler) = registry.resolve(target) else {
        tracing::warn!(job = %id, invocation = %target, "no handler registered for target");
        finalize(
            store,
            cache,
            clock,
            id,
            JobStatus::Error,
            Some(format!("no handler registered for target '{}'", target)),
        )
        .await;
        return;
    };

    let ctx = JobContext::new(
        id.clone(),
        job.invocation.args.clone(),
        store.clone(),
        cache.clone(),
        clock.clone(),
    );

    tracing::info!(job = %id, invocation = %target, "invocation started");
    let result = AssertUnwindSafe(handler.run(ctx)).catch_unwind().await;

    match result {
        Ok(Ok(Outcome::Completed)) => {
            finalize(store, cache, clock, id, JobStatus::Completed, None).await;
            tracing::info!(job = %id, "invocation completed");
        }
        Ok(Ok(Outcome::Stopped)) => {
            finalize(store, cache, clock, id, JobStatus::Stopped, None).await;
            tracing::info!(job = %id, "invocation stopped at checkpoint");
        }
        Ok(Ok(Outcome::Paused)) => {
            pause(store, cache, clock, id).await;
            tracing::info!(job = %id, "invocation paused at checkpoint");
        }
        Ok(Err(failure)) => {
            tracing::warn!(job = %id, error = %failure, "invocation failed");
            finalize(store, cache, clock, id, JobStatus::Error, Some(failure.0)).await;
        }
        Err(panic) => {
            let message = panic_message(panic);
            tracing::error!(job = %id, error = %message, "invocation panicked");
            finalize(store, cache, clock, id, JobStatus::Error, Some(message)).await;
        }
    }
}

/// Final progress + terminal status, written before the slot is released.
/// Storage failures here are logged and left for orphan recovery to retry.
async fn finalize(
    store: &Arc<dyn JobStore>,
    cache: &Arc<ProgressCache>,
    clock: &Arc<dyn Clock>,
    id: &JobId,
    status: JobStatus,
    error: Option<String>,
) {
    let now = clock.epoch_ms();
    let progress = match status {
        JobStatus::Completed => {
            // Keep the invocation's last note/data, force percent to 100.
            let mut p = cache.latest(id).unwrap_or(JobProgress::at(100, now));
            p.percent = 100;
            p.updated_at_ms = now;
            p
        }
        _ => cache.latest(id).unwrap_or(JobProgress::at(0, now)),
    };

    if let Err(e) = cache.flush_final(store.as_ref(), id, progress).await {
        tracing::error!(job = %id, error = %e, "final progress flush failed");
    }
    if let Err(e) = store.set_final(id, status, error).await {
        tracing::error!(job = %id, error = %e, "finalization failed; orphan sweep will recover");
    }
}

async fn pause(
    store: &Arc<dyn JobStore>,
    cache: &Arc<ProgressCache>,
    clock: &Arc<dyn Clock>,
    id: &JobId,
) {
    let progress = cache.latest(id).unwrap_or(JobProgress::at(0, clock.epoch_ms()));
    if let Err(e) = cache.flush_final(store.as_ref(), id, progress).await {
        tracing::error!(job = %id, error = %e, "pause progress flush failed");
    }
    if let Err(e) = store.set_paused(id).await {
        tracing::error!(job = %id, error = %e, "pause write failed");
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "invocation panicked".to_string()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
