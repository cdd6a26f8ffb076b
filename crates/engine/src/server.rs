// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server instance: claim loop, worker pool, housekeeping.
//!
//! Any number of instances may run against the same store; the claim
//! protocol keeps them from executing the same job twice. An instance
//! carries no state another instance depends on, so losing one only
//! delays its jobs until the orphan sweep returns them to the queue.

use crate::cache::ProgressCache;
use crate::executor::Executor;
use crate::handler::HandlerRegistry;
use rota_core::{
    Clock, ConfigError, FileIdentityStore, IdentityError, IdentityProvider, JobId, JobProgress,
    ProcessId, ServerConfig, SystemClock,
};
use rota_storage::{open_store, JobStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("process identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

pub struct JobServer {
    config: ServerConfig,
    process_id: ProcessId,
    store: Arc<dyn JobStore>,
    cache: Arc<ProgressCache>,
    executor: Executor,
    shutdown: CancellationToken,
    loops: TaskTracker,
}

impl JobServer {
    /// Build an instance against a store opened from the config's storage
    /// mode, keeping wall-clock time.
    pub fn new(config: ServerConfig, registry: HandlerRegistry) -> Result<Self, ServerError> {
        let store = open_store(config.storage_mode, SystemClock);
        Self::with_store(config, registry, store, SystemClock)
    }

    /// Build an instance against an existing store handle. This is how
    /// several instances in one process share a backend, and how tests
    /// substitute a fake clock.
    pub fn with_store<C: Clock + 'static>(
        config: ServerConfig,
        registry: HandlerRegistry,
        store: Arc<dyn JobStore>,
        clock: C,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let identity = IdentityProvider::new(FileIdentityStore::new(config.identity_path.clone()));
        let process_id = identity.get_or_create(config.reuse_identity)?;

        let clock: Arc<dyn Clock> = Arc::new(clock);
        let cache = Arc::new(ProgressCache::new(
            config.progress_flush_interval,
            clock.clone(),
        ));
        let executor = Executor::new(
            Arc::new(registry),
            store.clone(),
            cache.clone(),
            clock,
            config.workers,
        );

        tracing::info!(process_id = %process_id, workers = config.workers, "server instance ready");
        Ok(Self {
            config,
            process_id,
            store,
            cache,
            executor,
            shutdown: CancellationToken::new(),
            loops: TaskTracker::new(),
        })
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Spawn the dispatch and housekeeping loops. Returns immediately;
    /// call [`stop`](Self::stop) to wind the instance down.
    pub fn start(self: &Arc<Self>) {
        let server = Arc::clone(self);
        self.loops.spawn(async move {
            let mut tick = tokio::time::interval(server.config.poll_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = server.shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = server.dispatch_once().await {
                            tracing::error!(error = %e, "dispatch pass failed");
                        }
                        if server.config.polling_once {
                            break;
                        }
                    }
                }
            }
        });

        let server = Arc::clone(self);
        self.loops.spawn(async move {
            let mut tick = tokio::time::interval(server.config.housekeeping_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = server.shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = server.housekeeping_once().await {
                            tracing::error!(error = %e, "housekeeping pass failed");
                        }
                        if server.config.polling_once {
                            break;
                        }
                    }
                }
            }
        });
        self.loops.close();
    }

    /// One claim-and-dispatch pass: fill remaining capacity with eligible
    /// jobs and hand them to the pool. Returns how many were claimed.
    pub async fn dispatch_once(&self) -> Result<usize, ServerError> {
        let capacity = self
            .config
            .max_runnable_jobs
            .saturating_sub(self.executor.running_count());
        if capacity == 0 {
            return Ok(0);
        }
        let claimed = self.store.claim_eligible(&self.process_id, capacity).await?;
        let count = claimed.len();
        if count > 0 {
            tracing::debug!(count, "claimed jobs for dispatch");
        }
        for job in claimed {
            self.executor.submit(job);
        }
        Ok(count)
    }

    /// One housekeeping pass: requeue orphans, then run the auto-delete
    /// sweep when one is configured.
    pub async fn housekeeping_once(&self) -> Result<(), ServerError> {
        let orphans = self.store.find_orphans(self.config.orphan_age).await?;
        // A job this instance still holds is slow, not orphaned; its
        // heartbeat is stale only because the handler has not reported.
        let stale: Vec<_> = orphans
            .into_iter()
            .filter(|job| !self.executor.is_active(&job.id))
            .map(|job| job.id)
            .collect();
        if !stale.is_empty() {
            let requeued = self.store.requeue(&stale).await?;
            tracing::info!(requeued, "returned orphaned jobs to the queue");
        }

        if let Some(period) = self.config.auto_delete_period {
            let removed = self
                .store
                .delete_aged(period, &self.config.auto_delete_statuses)
                .await?;
            if removed > 0 {
                tracing::debug!(removed, "auto-deleted aged jobs");
            }
        }
        Ok(())
    }

    /// Latest progress for a job as this instance sees it: a fresh local
    /// cache entry when the job runs here, otherwise the durable snapshot.
    pub async fn get_progress(&self, id: &JobId) -> Result<Option<JobProgress>, ServerError> {
        Ok(self.cache.get(self.store.as_ref(), id).await?)
    }

    /// Number of jobs this instance currently holds claims for.
    pub fn running_count(&self) -> usize {
        self.executor.running_count()
    }

    /// Stop the loops and drain the pool. Honors the configured stop
    /// delay and force-stop policy.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.loops.close();
        self.loops.wait().await;
        self.executor
            .shutdown(self.config.stop_delay, self.config.force_stop)
            .await;
        tracing::info!(process_id = %self.process_id, "server instance stopped");
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
