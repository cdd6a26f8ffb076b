// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operations the scheduling engine requires from durable storage.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rota_core::{Job, JobCommand, JobConfig, JobId, JobProgress, JobStatus, ProcessId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Storage failures. Transient read/write errors abort the current cycle
/// iteration and are retried on the next timer tick; no job state is
/// assumed changed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-optimized projection of a job for listings and UI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub app_id: Option<String>,
    pub user_id: Option<String>,
    pub job_type: Option<String>,
    pub job_name: Option<String>,
    pub status: JobStatus,
    pub command: Option<JobCommand>,
    pub process_id: Option<ProcessId>,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub progress: Option<JobProgress>,
    pub error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            app_id: job.app_id.clone(),
            user_id: job.user_id.clone(),
            job_type: job.job_type.clone(),
            job_name: job.job_name.clone(),
            status: job.status,
            command: job.command,
            process_id: job.process_id.clone(),
            created: epoch_ms_to_utc(job.created_ms),
            started: job.started_ms.map(epoch_ms_to_utc),
            ended: job.ended_ms.map(epoch_ms_to_utc),
            progress: job.progress.clone(),
            error: job.error.clone(),
        }
    }
}

fn epoch_ms_to_utc(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64).single().unwrap_or_default()
}

/// One page of job views plus the total count across all pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobViewPage {
    pub total: usize,
    pub views: Vec<JobView>,
}

/// Aggregate count of jobs in one status; derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusCount {
    pub status: JobStatus,
    pub count: usize,
}

/// The storage contract.
///
/// Implementations must guarantee:
/// - `claim_eligible` has compare-and-set semantics per job: two concurrent
///   callers, same or different process, never both receive the same
///   unclaimed job.
/// - Any write that moves a job to a terminal status clears `process_id`
///   and the pending command in the same logical update.
/// - `update`/`delete`/`reset` never touch an owned, in-progress job; the
///   affected count reflects what was actually changed.
/// - Read paths reflect the latest committed write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new queued job, minting its ID and creation timestamp.
    async fn add(&self, config: JobConfig) -> Result<JobId, StorageError>;

    /// Replace a job's invocation and classification. Rejected (count 0)
    /// once the job has started executing or has a claim owner.
    async fn update(&self, id: &JobId, config: JobConfig) -> Result<u64, StorageError>;

    /// Remove jobs. Owned, in-progress jobs are skipped.
    async fn delete(&self, ids: &[JobId]) -> Result<u64, StorageError>;

    /// Return non-running jobs to a fresh queued state: status, command,
    /// ownership, progress, timestamps and error all cleared.
    async fn reset(&self, ids: &[JobId]) -> Result<u64, StorageError>;

    /// Atomically select up to `max` eligible jobs (queued, or paused with a
    /// continue command) and mark them running and owned by `owner` in the
    /// same operation. RunNow-flagged jobs come first, then creation order.
    async fn claim_eligible(
        &self,
        owner: &ProcessId,
        max: usize,
    ) -> Result<Vec<Job>, StorageError>;

    /// Set a command on each job where it is legal for the job's current
    /// status; returns the number actually affected. Illegal applications
    /// are silently skipped — partial success is the normal contract.
    /// Stop on a queued or paused job takes effect immediately (terminal
    /// Stopped) rather than waiting for a worker checkpoint.
    async fn set_command(&self, ids: &[JobId], command: JobCommand)
        -> Result<u64, StorageError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StorageError>;

    async fn get_job_view(&self, id: &JobId) -> Result<Option<JobView>, StorageError>;

    /// Page through job views in creation order.
    async fn get_job_views(
        &self,
        page_index: usize,
        page_size: usize,
    ) -> Result<JobViewPage, StorageError>;

    /// Counts of jobs grouped by status, optionally filtered.
    async fn get_status_count(
        &self,
        app_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<JobStatusCount>, StorageError>;

    async fn get_progress(&self, id: &JobId) -> Result<Option<JobProgress>, StorageError>;

    /// Durable progress write; also serves as the owner's heartbeat for
    /// orphan detection. Ignored for jobs already terminal.
    async fn update_progress(
        &self,
        id: &JobId,
        progress: JobProgress,
    ) -> Result<(), StorageError>;

    /// Move a job to a terminal status, clearing ownership in the same
    /// update. `error` is recorded only for `JobStatus::Error`.
    async fn set_final(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), StorageError>;

    /// Record a pause observed at a worker checkpoint. The claim owner is
    /// retained; a continue command makes the job claimable again.
    async fn set_paused(&self, id: &JobId) -> Result<(), StorageError>;

    /// Owned, Running jobs whose heartbeat is older than `older_than`.
    /// Liveness is age-based: there is no central registry of instances.
    /// Paused jobs are never orphans; they resume only through a
    /// continue command.
    async fn find_orphans(&self, older_than: Duration) -> Result<Vec<Job>, StorageError>;

    /// Return orphaned Running jobs to the queue, clearing ownership so
    /// any instance can re-claim them.
    async fn requeue(&self, ids: &[JobId]) -> Result<u64, StorageError>;

    /// Remove terminal jobs whose end time is at least `period` old and
    /// whose status is in `statuses`.
    async fn delete_aged(
        &self,
        period: Duration,
        statuses: &[JobStatus],
    ) -> Result<u64, StorageError>;
}
