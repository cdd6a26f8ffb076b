// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command protocol specs: stop, pause, continue through real checkpoints.

use crate::prelude::*;
use rota_engine::Checkpoint;
use std::sync::atomic::{AtomicU32, Ordering};

/// Reports once so tests can tell it started, then loops at checkpoints
/// until commanded. Completes only when a stop or pause never arrives
/// within the iteration budget.
struct Cooperative {
    iterations: u32,
}

#[async_trait]
impl JobHandler for Cooperative {
    async fn run(&self, ctx: JobContext) -> Result<Outcome, JobFailure> {
        ctx.report_progress(10, None).await?;
        for _ in 0..self.iterations {
            match ctx.checkpoint().await? {
                Checkpoint::Stop => return Ok(Outcome::Stopped),
                Checkpoint::Pause => return Ok(Outcome::Paused),
                Checkpoint::Continue => {}
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(Outcome::Completed)
    }
}

fn registry(iterations: u32) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("work", Arc::new(Cooperative { iterations }));
    registry
}

async fn add_and_start(cluster: &Cluster) -> JobId {
    cluster
        .client
        .add(JobConfig::builder("work").build())
        .await
        .unwrap()
}

/// Wait until the handler has reported, i.e. it is really executing.
async fn wait_until_reporting(cluster: &Cluster, id: &JobId) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cluster.client.get_progress(id).await.unwrap().is_none() {
        assert!(tokio::time::Instant::now() < deadline, "handler never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn stop_while_queued_is_immediate_and_never_executes() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(1), |c| c);

    let id = add_and_start(&cluster).await;
    assert_eq!(cluster.client.stop(std::slice::from_ref(&id)).await.unwrap(), 1);

    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(job.process_id.is_none());
    assert!(job.command.is_none());

    // The next dispatch pass has nothing to claim.
    assert_eq!(server.dispatch_once().await.unwrap(), 0);
    assert!(cluster.client.get_progress(&id).await.unwrap().is_none());
    server.stop().await;
}

#[tokio::test]
async fn stop_while_running_lands_at_the_next_checkpoint() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(10_000), |c| c);

    let id = add_and_start(&cluster).await;
    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    wait_until_reporting(&cluster, &id).await;

    assert_eq!(cluster.client.stop(std::slice::from_ref(&id)).await.unwrap(), 1);
    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Stopped);

    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert!(job.process_id.is_none());
    assert!(job.command.is_none());
    server.stop().await;
}

/// First claim: report, then hold at checkpoints until a pause arrives.
/// Second claim (after a continue): restart from the top and complete.
struct PauseOnce(AtomicU32);

#[async_trait]
impl JobHandler for PauseOnce {
    async fn run(&self, ctx: JobContext) -> Result<Outcome, JobFailure> {
        ctx.report_progress(10, None).await?;
        if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
            for _ in 0..10_000 {
                if ctx.should_pause().await? {
                    return Ok(Outcome::Paused);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        Ok(Outcome::Completed)
    }
}

#[tokio::test]
async fn pause_then_continue_resumes_on_a_fresh_claim() {
    let mut cluster = Cluster::new();
    let mut registry = HandlerRegistry::new();
    registry.register("work", Arc::new(PauseOnce(AtomicU32::new(0))));
    let server = cluster.server(registry, |c| c);

    let id = add_and_start(&cluster).await;
    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    wait_until_reporting(&cluster, &id).await;

    // The handler holds at its checkpoint, so the job is still running.
    assert_eq!(cluster.client.pause(std::slice::from_ref(&id)).await.unwrap(), 1);
    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s == JobStatus::Paused || s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Paused);

    // Paused keeps the claim owner, and without a continue command the
    // job is not eligible for another claim.
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.process_id.as_ref(), Some(server.process_id()));
    assert_eq!(server.dispatch_once().await.unwrap(), 0);

    assert_eq!(cluster.client.resume(std::slice::from_ref(&id)).await.unwrap(), 1);
    assert_eq!(server.dispatch_once().await.unwrap(), 1);

    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Completed);
    server.stop().await;
}

#[tokio::test]
async fn pause_is_rejected_for_jobs_that_are_not_running() {
    let mut cluster = Cluster::new();
    let _server = cluster.server(registry(1), |c| c);

    let queued = add_and_start(&cluster).await;
    assert_eq!(cluster.client.pause(std::slice::from_ref(&queued)).await.unwrap(), 0);
    let job = cluster.client.get_job(&queued).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.command.is_none());
}
