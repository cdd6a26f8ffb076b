// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invocation resolution and the checkpoint handle.
//!
//! A job's invocation record names a target; the registry resolves it to a
//! [`JobHandler`]. Every handler receives a [`JobContext`] through which it
//! reports progress and polls for pending commands at checkpoints of its
//! own choosing. Stop and Pause are cooperative: a handler that never
//! checkpoints cannot be interrupted, and command latency is bounded by
//! the handler's checkpoint frequency, not by the scheduler.

use crate::cache::ProgressCache;
use async_trait::async_trait;
use rota_core::{Clock, JobCommand, JobId, JobProgress};
use rota_storage::{JobStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure surfaced by an invocation. Recorded per-job as
/// `JobStatus::Error` with this message; never propagates to the scheduler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct JobFailure(pub String);

impl From<StorageError> for JobFailure {
    fn from(e: StorageError) -> Self {
        Self(e.to_string())
    }
}

impl From<&str> for JobFailure {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How an invocation ended, from the handler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to completion; the executor finalizes at 100%.
    Completed,
    /// Observed a stop command at a checkpoint and unwound.
    Stopped,
    /// Observed a pause command at a checkpoint. Execution restarts from
    /// the top when the job is continued and re-claimed.
    Paused,
}

/// Pending command observed at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Stop,
    Pause,
}

/// A resolvable unit of work.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: JobContext) -> Result<Outcome, JobFailure>;
}

/// Registry mapping invocation targets to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(target.into(), handler);
    }

    pub fn resolve(&self, target: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(target).cloned()
    }
}

/// Progress/command-check handle passed into every invocation.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    /// The invocation's serialized arguments, opaque to the engine.
    pub args: serde_json::Value,
    store: Arc<dyn JobStore>,
    cache: Arc<ProgressCache>,
    clock: Arc<dyn Clock>,
}

impl JobContext {
    pub(crate) fn new(
        job_id: JobId,
        args: serde_json::Value,
        store: Arc<dyn JobStore>,
        cache: Arc<ProgressCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { job_id, args, store, cache, clock }
    }

    /// Report progress. Buffered by the progress cache; durable at least
    /// once per flush interval.
    pub async fn report_progress(
        &self,
        percent: u8,
        note: Option<String>,
    ) -> Result<(), StorageError> {
        let mut progress = JobProgress::at(percent, self.clock.epoch_ms());
        progress.note = note;
        self.cache.report(self.store.as_ref(), &self.job_id, progress).await
    }

    /// Report progress with an opaque data blob attached.
    pub async fn report_with_data(
        &self,
        percent: u8,
        note: Option<String>,
        data: serde_json::Value,
    ) -> Result<(), StorageError> {
        let mut progress = JobProgress::at(percent, self.clock.epoch_ms());
        progress.note = note;
        progress.data = Some(data);
        self.cache.report(self.store.as_ref(), &self.job_id, progress).await
    }

    /// Poll for a pending command. Handlers call this at safe points and
    /// return `Outcome::Stopped` / `Outcome::Paused` when told to.
    pub async fn checkpoint(&self) -> Result<Checkpoint, StorageError> {
        let job = self.store.get_job(&self.job_id).await?;
        Ok(match job.and_then(|j| j.command) {
            Some(JobCommand::Stop) => Checkpoint::Stop,
            Some(JobCommand::Pause) => Checkpoint::Pause,
            _ => Checkpoint::Continue,
        })
    }

    pub async fn should_stop(&self) -> Result<bool, StorageError> {
        Ok(self.checkpoint().await? == Checkpoint::Stop)
    }

    pub async fn should_pause(&self) -> Result<bool, StorageError> {
        Ok(self.checkpoint().await? == Checkpoint::Pause)
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
