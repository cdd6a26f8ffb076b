// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference backend.
//!
//! A single mutex over the job table gives every multi-step operation
//! (claim, command application, guarded delete/reset) the atomicity the
//! contract demands. Useful on its own for single-process deployments and
//! for tests.

use crate::contract::{JobStatusCount, JobStore, JobView, JobViewPage, StorageError};
use async_trait::async_trait;
use parking_lot::Mutex;
use rota_core::{Clock, Job, JobCommand, JobConfig, JobId, JobProgress, JobStatus, ProcessId};
use std::collections::HashMap;
use std::time::Duration;

pub struct MemoryStore<C: Clock> {
    clock: C,
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl<C: Clock> MemoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, jobs: Mutex::new(HashMap::new()) }
    }

    fn sorted_views(jobs: &HashMap<JobId, Job>) -> Vec<&Job> {
        let mut all: Vec<&Job> = jobs.values().collect();
        all.sort_by(|a, b| a.created_ms.cmp(&b.created_ms).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        all
    }
}

#[async_trait]
impl<C: Clock> JobStore for MemoryStore<C> {
    async fn add(&self, config: JobConfig) -> Result<JobId, StorageError> {
        let job = Job::new(config, self.clock.epoch_ms());
        let id = job.id.clone();
        self.jobs.lock().insert(id.clone(), job);
        tracing::debug!(job = %id, "job added");
        Ok(id)
    }

    async fn update(&self, id: &JobId, config: JobConfig) -> Result<u64, StorageError> {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(id) else { return Ok(0) };
        // Rejected once the job has started or holds a claim.
        if job.status != JobStatus::Queued || job.is_owned() {
            return Ok(0);
        }
        job.invocation = config.invocation;
        job.app_id = config.app_id;
        job.user_id = config.user_id;
        job.job_type = config.job_type;
        job.job_name = config.job_name;
        Ok(1)
    }

    async fn delete(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        let mut jobs = self.jobs.lock();
        let mut affected = 0;
        for id in ids {
            let deletable = jobs.get(id).is_some_and(|j| j.status != JobStatus::Running);
            if deletable {
                jobs.remove(id);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn reset(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        let mut jobs = self.jobs.lock();
        let mut affected = 0;
        for id in ids {
            if let Some(job) = jobs.get_mut(id) {
                if job.status == JobStatus::Running {
                    continue;
                }
                job.status = JobStatus::Queued;
                job.command = None;
                job.process_id = None;
                job.started_ms = None;
                job.ended_ms = None;
                job.progress = None;
                job.error = None;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn claim_eligible(
        &self,
        owner: &ProcessId,
        max: usize,
    ) -> Result<Vec<Job>, StorageError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let now = self.clock.epoch_ms();
        let mut jobs = self.jobs.lock();

        // (not run-now, created, id): RunNow jobs take precedence, then
        // stable creation order.
        let mut eligible: Vec<(bool, u64, JobId)> = jobs
            .values()
            .filter(|j| match j.status {
                JobStatus::Queued => !j.is_owned(),
                JobStatus::Paused => j.command == Some(JobCommand::Continue),
                _ => false,
            })
            .map(|j| (j.command != Some(JobCommand::RunNow), j.created_ms, j.id.clone()))
            .collect();
        eligible.sort();
        eligible.truncate(max);

        let mut claimed = Vec::with_capacity(eligible.len());
        for (_, _, id) in eligible {
            if let Some(job) = jobs.get_mut(&id) {
                job.status = JobStatus::Running;
                job.process_id = Some(owner.clone());
                job.command = None;
                job.started_ms = Some(now);
                claimed.push(job.clone());
            }
        }
        if !claimed.is_empty() {
            tracing::debug!(owner = %owner, count = claimed.len(), "claimed eligible jobs");
        }
        Ok(claimed)
    }

    async fn set_command(
        &self,
        ids: &[JobId],
        command: JobCommand,
    ) -> Result<u64, StorageError> {
        let now = self.clock.epoch_ms();
        let mut jobs = self.jobs.lock();
        let mut affected = 0;
        for id in ids {
            if let Some(job) = jobs.get_mut(id) {
                if !command.applies_to(job.status) {
                    continue;
                }
                if command.is_immediate_for(job.status) {
                    // Stop on a queued or paused job never reaches a worker.
                    job.finalize(JobStatus::Stopped, None, now);
                } else {
                    job.command = Some(command);
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        Ok(self.jobs.lock().get(id).cloned())
    }

    async fn get_job_view(&self, id: &JobId) -> Result<Option<JobView>, StorageError> {
        Ok(self.jobs.lock().get(id).map(JobView::from))
    }

    async fn get_job_views(
        &self,
        page_index: usize,
        page_size: usize,
    ) -> Result<JobViewPage, StorageError> {
        let jobs = self.jobs.lock();
        let all = Self::sorted_views(&jobs);
        let views = all
            .iter()
            .skip(page_index.saturating_mul(page_size))
            .take(page_size)
            .map(|j| JobView::from(*j))
            .collect();
        Ok(JobViewPage { total: all.len(), views })
    }

    async fn get_status_count(
        &self,
        app_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<JobStatusCount>, StorageError> {
        let jobs = self.jobs.lock();
        let mut counts: HashMap<JobStatus, usize> = HashMap::new();
        for job in jobs.values() {
            if app_id.is_some_and(|a| job.app_id.as_deref() != Some(a)) {
                continue;
            }
            if user_id.is_some_and(|u| job.user_id.as_deref() != Some(u)) {
                continue;
            }
            *counts.entry(job.status).or_insert(0) += 1;
        }
        let mut out: Vec<JobStatusCount> = counts
            .into_iter()
            .map(|(status, count)| JobStatusCount { status, count })
            .collect();
        out.sort_by_key(|c| c.status.to_string());
        Ok(out)
    }

    async fn get_progress(&self, id: &JobId) -> Result<Option<JobProgress>, StorageError> {
        Ok(self.jobs.lock().get(id).and_then(|j| j.progress.clone()))
    }

    async fn update_progress(
        &self,
        id: &JobId,
        progress: JobProgress,
    ) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(id) {
            if !job.status.is_terminal() {
                job.progress = Some(progress);
            }
        }
        Ok(())
    }

    async fn set_final(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(id) {
            job.finalize(status, error, now);
        }
        Ok(())
    }

    async fn set_paused(&self, id: &JobId) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(id) {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Paused;
                job.command = None;
            }
        }
        Ok(())
    }

    async fn find_orphans(&self, older_than: Duration) -> Result<Vec<Job>, StorageError> {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(older_than.as_millis() as u64);
        let jobs = self.jobs.lock();
        Ok(jobs
            .values()
            .filter(|j| {
                // Paused jobs keep their owner but are deliberately idle;
                // they re-enter the pool through a Continue command, never
                // through the orphan sweep.
                j.is_owned() && j.status == JobStatus::Running && j.heartbeat_ms() < cutoff
            })
            .cloned()
            .collect())
    }

    async fn requeue(&self, ids: &[JobId]) -> Result<u64, StorageError> {
        let mut jobs = self.jobs.lock();
        let mut affected = 0;
        for id in ids {
            if let Some(job) = jobs.get_mut(id) {
                if job.status != JobStatus::Running || !job.is_owned() {
                    continue;
                }
                job.status = JobStatus::Queued;
                job.command = None;
                job.process_id = None;
                job.started_ms = None;
                affected += 1;
            }
        }
        if affected > 0 {
            tracing::debug!(count = affected, "requeued orphaned jobs");
        }
        Ok(affected)
    }

    async fn delete_aged(
        &self,
        period: Duration,
        statuses: &[JobStatus],
    ) -> Result<u64, StorageError> {
        let now = self.clock.epoch_ms();
        let period_ms = period.as_millis() as u64;
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| {
            let aged_out = statuses.contains(&job.status)
                && job
                    .ended_ms
                    .is_some_and(|ended| now.saturating_sub(ended) >= period_ms);
            !aged_out
        });
        let removed = (before - jobs.len()) as u64;
        if removed > 0 {
            tracing::debug!(count = removed, "auto-deleted aged jobs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
