// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated server configuration.
//!
//! Callers construct a [`ServerConfig`] with sensible defaults, override
//! what they need through the setter methods, and the server validates it
//! once at startup. Validation failures are fatal: the process does not
//! start serving.

use crate::job::JobStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, surfaced before either scheduling cycle starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    ZeroWorkers,
    #[error("max_runnable_jobs must be at least 1")]
    ZeroMaxRunnable,
    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),
    #[error("auto_delete_period is set but auto_delete_statuses is empty")]
    EmptyAutoDeleteStatuses,
    #[error("auto_delete_statuses may only contain terminal statuses, got {0}")]
    NonTerminalAutoDeleteStatus(JobStatus),
}

/// Which storage backend the factory should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// In-process reference backend.
    Memory,
}

/// Scheduler and execution settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub storage_mode: StorageMode,
    /// Upper bound on jobs this instance will hold claims for at once.
    pub max_runnable_jobs: usize,
    /// Concurrent execution slots in the worker pool.
    pub workers: usize,
    /// Claim & dispatch cycle interval.
    pub poll_interval: Duration,
    /// Housekeeping cycle interval (orphans, auto-delete).
    pub housekeeping_interval: Duration,
    /// Minimum spacing between durable progress writes per job.
    pub progress_flush_interval: Duration,
    /// Owned jobs whose heartbeat is older than this are treated as orphans.
    pub orphan_age: Duration,
    /// Terminal jobs older than this are removed; `None` disables the sweep.
    pub auto_delete_period: Option<Duration>,
    /// Statuses eligible for auto-delete.
    pub auto_delete_statuses: Vec<JobStatus>,
    /// Run one dispatch cycle and then idle (debugging mode).
    pub polling_once: bool,
    /// On shutdown, abandon in-flight jobs after `stop_delay` instead of
    /// waiting for them to reach a checkpoint.
    pub force_stop: bool,
    /// How long shutdown waits for in-flight workers before the
    /// `force_stop` decision applies.
    pub stop_delay: Duration,
    /// Reuse a persisted identity across restarts.
    pub reuse_identity: bool,
    /// Where the identity is persisted.
    pub identity_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::Memory,
            max_runnable_jobs: 100,
            workers: 1,
            poll_interval: Duration::from_secs(5),
            housekeeping_interval: Duration::from_secs(10),
            progress_flush_interval: Duration::from_secs(10),
            orphan_age: Duration::from_secs(300),
            auto_delete_period: None,
            auto_delete_statuses: vec![JobStatus::Completed],
            polling_once: false,
            force_stop: false,
            stop_delay: Duration::from_secs(30),
            reuse_identity: false,
            identity_path: std::env::temp_dir().join("rota-process-id"),
        }
    }
}

impl ServerConfig {
    crate::setters! {
        into {
            identity_path: PathBuf,
        }
        set {
            storage_mode: StorageMode,
            max_runnable_jobs: usize,
            workers: usize,
            poll_interval: Duration,
            housekeeping_interval: Duration,
            progress_flush_interval: Duration,
            orphan_age: Duration,
            auto_delete_statuses: Vec<JobStatus>,
            polling_once: bool,
            force_stop: bool,
            stop_delay: Duration,
            reuse_identity: bool,
        }
        option {
            auto_delete_period: Duration,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.max_runnable_jobs == 0 {
            return Err(ConfigError::ZeroMaxRunnable);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("poll_interval"));
        }
        if self.housekeeping_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("housekeeping_interval"));
        }
        if self.progress_flush_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("progress_flush_interval"));
        }
        if self.orphan_age.is_zero() {
            return Err(ConfigError::ZeroInterval("orphan_age"));
        }
        if self.auto_delete_period.is_some() {
            if self.auto_delete_statuses.is_empty() {
                return Err(ConfigError::EmptyAutoDeleteStatuses);
            }
            if let Some(status) =
                self.auto_delete_statuses.iter().find(|s| !s.is_terminal())
            {
                return Err(ConfigError::NonTerminalAutoDeleteStatus(*status));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
