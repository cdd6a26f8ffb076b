// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record, status/command state machine, and submission config.
//!
//! The state machine is pure logic: [`JobStatus`] names the states,
//! [`JobCommand`] the cooperative control requests, and
//! [`JobCommand::applies_to`] the legality table. All I/O-driven transitions
//! (claim, checkpoint observation, finalization) live behind the storage
//! contract and the executor.

use crate::identity::ProcessId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Unique identifier for a job, minted by the store on `add`.
///
/// Format is `job-` followed by a 19-character nanoid, which fits SmolStr's
/// inline capacity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(SmolStr);

impl JobId {
    pub const PREFIX: &'static str = "job-";

    /// Generate a new random ID.
    pub fn generate() -> Self {
        Self(SmolStr::new(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, unclaimed, waiting for a dispatch cycle.
    Queued,
    /// Claimed by a server instance and executing.
    Running,
    /// Suspended at a checkpoint; still owned until continued or reclaimed.
    Paused,
    /// Finished successfully.
    Completed,
    /// Stopped by a command, before or during execution.
    Stopped,
    /// Invocation failed; `Job::error` carries the message.
    Error,
}

impl JobStatus {
    /// Terminal states admit no further transitions without an explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Stopped | JobStatus::Error)
    }
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Stopped => "stopped",
        Error => "error",
    }
}

/// Cooperative control request, set by clients and consumed by the worker at
/// checkpoints (or by the store itself where the effect is immediate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCommand {
    Stop,
    Pause,
    Continue,
    RunNow,
}

impl JobCommand {
    /// Legality table for command application.
    ///
    /// | status  | Stop | Pause | Continue | RunNow |
    /// |---------|------|-------|----------|--------|
    /// | Queued  | yes (immediate Stopped) | no | no | yes (claim priority) |
    /// | Running | yes (next checkpoint)   | yes (next checkpoint) | no | no |
    /// | Paused  | yes (immediate Stopped) | no | yes (re-eligible) | no |
    /// | terminal| no | no | no | no |
    pub fn applies_to(&self, status: JobStatus) -> bool {
        match self {
            JobCommand::Stop => {
                matches!(status, JobStatus::Queued | JobStatus::Running | JobStatus::Paused)
            }
            JobCommand::Pause => status == JobStatus::Running,
            JobCommand::Continue => status == JobStatus::Paused,
            JobCommand::RunNow => status == JobStatus::Queued,
        }
    }

    /// Commands whose effect is applied by the store in place, without
    /// waiting for a worker checkpoint.
    pub fn is_immediate_for(&self, status: JobStatus) -> bool {
        matches!(
            (self, status),
            (JobCommand::Stop, JobStatus::Queued) | (JobCommand::Stop, JobStatus::Paused)
        )
    }
}

crate::simple_display! {
    JobCommand {
        Stop => "stop",
        Pause => "pause",
        Continue => "continue",
        RunNow => "run-now",
    }
}

/// Opaque invocation record: a resolvable target name plus serialized
/// arguments. The engine never inspects `args`; it hands them to whatever
/// handler is registered for `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub target: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Invocation {
    pub fn new(target: impl Into<String>, args: serde_json::Value) -> Self {
        Self { target: target.into(), args }
    }
}

/// Latest progress snapshot for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Percent complete, 0–100.
    pub percent: u8,
    /// Free-text note from the invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Opaque data blob the invocation chose to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Epoch milliseconds of the report.
    pub updated_at_ms: u64,
}

impl JobProgress {
    pub fn at(percent: u8, updated_at_ms: u64) -> Self {
        Self { percent: percent.min(100), note: None, data: None, updated_at_ms }
    }
}

/// Submission config for creating or updating a job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub invocation: Invocation,
    pub app_id: Option<String>,
    pub user_id: Option<String>,
    pub job_type: Option<String>,
    pub job_name: Option<String>,
}

impl JobConfig {
    pub fn builder(target: impl Into<String>) -> JobConfigBuilder {
        JobConfigBuilder {
            target: target.into(),
            args: serde_json::Value::Null,
            app_id: None,
            user_id: None,
            job_type: None,
            job_name: None,
        }
    }
}

pub struct JobConfigBuilder {
    target: String,
    args: serde_json::Value,
    app_id: Option<String>,
    user_id: Option<String>,
    job_type: Option<String>,
    job_name: Option<String>,
}

impl JobConfigBuilder {
    crate::setters! {
        set {
            args: serde_json::Value,
        }
        option {
            app_id: String,
            user_id: String,
            job_type: String,
            job_name: String,
        }
    }

    pub fn build(self) -> JobConfig {
        JobConfig {
            invocation: Invocation::new(self.target, self.args),
            app_id: self.app_id,
            user_id: self.user_id,
            job_type: self.job_type,
            job_name: self.job_name,
        }
    }
}

/// A unit of deferred work, as stored in the shared job table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub app_id: Option<String>,
    pub user_id: Option<String>,
    pub job_type: Option<String>,
    pub job_name: Option<String>,
    pub invocation: Invocation,
    pub status: JobStatus,
    /// Pending control request; `None` means no command outstanding.
    pub command: Option<JobCommand>,
    /// Owner of the current claim; `None` when unclaimed.
    pub process_id: Option<ProcessId>,
    pub created_ms: u64,
    pub started_ms: Option<u64>,
    pub ended_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    /// Last failure message, present only when status is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a fresh queued job from a submission config.
    pub fn new(config: JobConfig, created_ms: u64) -> Self {
        Self {
            id: JobId::generate(),
            app_id: config.app_id,
            user_id: config.user_id,
            job_type: config.job_type,
            job_name: config.job_name,
            invocation: config.invocation,
            status: JobStatus::Queued,
            command: None,
            process_id: None,
            created_ms,
            started_ms: None,
            ended_ms: None,
            progress: None,
            error: None,
        }
    }

    /// True while some server instance holds the claim.
    pub fn is_owned(&self) -> bool {
        self.process_id.is_some()
    }

    /// Move to a terminal status, clearing ownership and any pending command
    /// in the same logical update so the job is immediately visible as
    /// unowned.
    pub fn finalize(&mut self, status: JobStatus, error: Option<String>, ended_ms: u64) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error = if status == JobStatus::Error { error } else { None };
        self.command = None;
        self.process_id = None;
        self.ended_ms = Some(ended_ms);
    }

    /// Timestamp used for orphan staleness: the most recent sign of life
    /// from the owning process.
    pub fn heartbeat_ms(&self) -> u64 {
        self.progress
            .as_ref()
            .map(|p| p.updated_at_ms)
            .or(self.started_ms)
            .unwrap_or(self.created_ms)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    config: JobConfigBuilder,
    status: JobStatus,
    command: Option<JobCommand>,
    process_id: Option<ProcessId>,
    created_ms: u64,
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn command(mut self, command: JobCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn owner(mut self, process_id: ProcessId) -> Self {
        self.process_id = Some(process_id);
        self
    }

    pub fn created_ms(mut self, ms: u64) -> Self {
        self.created_ms = ms;
        self
    }

    pub fn app_id(mut self, app_id: &str) -> Self {
        self.config = self.config.app_id(app_id);
        self
    }

    pub fn build(self) -> Job {
        let mut job = Job::new(self.config.build(), self.created_ms);
        job.status = self.status;
        job.command = self.command;
        job.process_id = self.process_id;
        if matches!(job.status, JobStatus::Running | JobStatus::Paused) {
            job.started_ms = Some(self.created_ms);
        }
        if job.status.is_terminal() {
            job.process_id = None;
            job.command = None;
            job.ended_ms = Some(self.created_ms);
        }
        job
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Job {
    /// Test builder with a no-op invocation target.
    pub fn builder() -> JobBuilder {
        JobBuilder {
            config: JobConfig::builder("test-target"),
            status: JobStatus::Queued,
            command: None,
            process_id: None,
            created_ms: 1_000_000,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
