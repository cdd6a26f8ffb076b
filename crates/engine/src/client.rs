// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission and control surface.
//!
//! A [`JobClient`] talks straight to the shared store and needs no server
//! instance in its process; commands land in the job table and are picked
//! up by whichever instance owns (or claims) the job. Command methods
//! return how many jobs were actually affected — callers pass batches and
//! partial application is the normal contract.

use rota_core::{Job, JobCommand, JobConfig, JobId, JobProgress};
use rota_storage::{JobStatusCount, JobStore, JobView, JobViewPage, StorageError};
use std::sync::Arc;

#[derive(Clone)]
pub struct JobClient {
    store: Arc<dyn JobStore>,
}

impl JobClient {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Queue a new job, returning its minted ID.
    pub async fn add(&self, config: JobConfig) -> Result<JobId, StorageError> {
        let id = self.store.add(config).await?;
        tracing::debug!(job = %id, "job queued");
        Ok(id)
    }

    /// Replace a queued job's definition. Returns 0 once the job has been
    /// claimed or started.
    pub async fn update(&self, id: &JobId, config: JobConfig) -> Result<u64, StorageError> {
        self.store.update(id, config).await
    }

    /// Request a stop. Queued and paused jobs stop immediately; running
    /// jobs stop at their next checkpoint.
    pub async fn stop(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        self.command(ids, JobCommand::Stop).await
    }

    /// Request a pause at the next checkpoint. Only running jobs qualify.
    pub async fn pause(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        self.command(ids, JobCommand::Pause).await
    }

    /// Make paused jobs claimable again.
    pub async fn resume(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        self.command(ids, JobCommand::Continue).await
    }

    /// Move queued jobs to the front of the claim order.
    pub async fn run_now(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        self.command(ids, JobCommand::RunNow).await
    }

    async fn command(&self, ids: &[JobId], command: JobCommand) -> Result<u64, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let affected = self.store.set_command(ids, command).await?;
        tracing::debug!(%command, affected, "command applied");
        Ok(affected)
    }

    /// Return non-running jobs to a fresh queued state.
    pub async fn reset(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.reset(ids).await
    }

    /// Remove non-running jobs.
    pub async fn delete(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete(ids).await
    }

    pub async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        self.store.get_job(id).await
    }

    pub async fn get_job_view(&self, id: &JobId) -> Result<Option<JobView>, StorageError> {
        self.store.get_job_view(id).await
    }

    /// Page through job views in creation order.
    pub async fn get_job_views(
        &self,
        page_index: usize,
        page_size: usize,
    ) -> Result<JobViewPage, StorageError> {
        self.store.get_job_views(page_index, page_size).await
    }

    /// Counts by status, optionally scoped to an application or user.
    pub async fn get_status_count(
        &self,
        app_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<JobStatusCount>, StorageError> {
        self.store.get_status_count(app_id, user_id).await
    }

    /// Latest durable progress snapshot. At most one flush interval stale
    /// while the job is executing on some instance.
    pub async fn get_progress(&self, id: &JobId) -> Result<Option<JobProgress>, StorageError> {
        self.store.get_progress(id).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
