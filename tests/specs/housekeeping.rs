// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeping specs: orphan recovery and the auto-delete sweep.

use crate::prelude::*;

struct Quick;

#[async_trait]
impl JobHandler for Quick {
    async fn run(&self, ctx: JobContext) -> Result<Outcome, JobFailure> {
        ctx.report_progress(100, None).await?;
        Ok(Outcome::Completed)
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("quick", Arc::new(Quick));
    registry
}

#[tokio::test]
async fn orphaned_job_is_requeued_and_finished_by_a_live_instance() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(), |c| c.orphan_age(Duration::from_secs(60)));

    // Claimed by an identity that never executes it, as if that process
    // died right after claiming.
    let id = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    let dead = ProcessId::generate();
    assert_eq!(cluster.store.claim_eligible(&dead, 1).await.unwrap().len(), 1);

    // Not stale yet: nothing to recover, nothing to claim.
    server.housekeeping_once().await.unwrap();
    assert_eq!(server.dispatch_once().await.unwrap(), 0);
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.process_id, Some(dead.clone()));

    cluster.clock.advance(Duration::from_secs(120));
    server.housekeeping_once().await.unwrap();
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.process_id.is_none());

    // A live instance picks it up and runs it to completion.
    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Completed);
    server.stop().await;
}

#[tokio::test]
async fn progress_reports_keep_a_slow_job_from_looking_orphaned() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(), |c| c.orphan_age(Duration::from_secs(60)));

    let id = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    let owner = ProcessId::generate();
    cluster.store.claim_eligible(&owner, 1).await.unwrap();

    // The owner keeps heartbeating via progress writes.
    cluster.clock.advance(Duration::from_secs(45));
    cluster
        .store
        .update_progress(&id, rota_core::JobProgress::at(20, cluster.clock.epoch_ms()))
        .await
        .unwrap();
    cluster.clock.advance(Duration::from_secs(45));

    // 90s since the claim, but only 45s since the last heartbeat.
    server.housekeeping_once().await.unwrap();
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.process_id, Some(owner));
    server.stop().await;
}

#[tokio::test]
async fn paused_job_survives_the_orphan_sweep_until_resumed() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(), |c| c.orphan_age(Duration::from_secs(60)));

    let id = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    let owner = ProcessId::generate();
    cluster.store.claim_eligible(&owner, 1).await.unwrap();
    cluster.store.set_paused(&id).await.unwrap();

    // Far past the orphan age with no heartbeat: still not an orphan.
    cluster.clock.advance(Duration::from_secs(600));
    server.housekeeping_once().await.unwrap();
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Paused);
    assert_eq!(job.process_id, Some(owner));
    assert_eq!(server.dispatch_once().await.unwrap(), 0);

    // Only a continue command returns it to the pool.
    assert_eq!(cluster.client.resume(&[id.clone()]).await.unwrap(), 1);
    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Completed);
    server.stop().await;
}

#[tokio::test]
async fn auto_delete_boundary_is_exact() {
    let mut cluster = Cluster::new();
    let period = Duration::from_secs(3600);
    let server = cluster.server(registry(), |c| {
        c.auto_delete_period(period)
            .auto_delete_statuses(vec![JobStatus::Completed])
    });

    let id = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    cluster.store.claim_eligible(&ProcessId::generate(), 1).await.unwrap();
    cluster
        .store
        .set_final(&id, JobStatus::Completed, None)
        .await
        .unwrap();

    cluster.clock.advance(period - Duration::from_secs(1));
    server.housekeeping_once().await.unwrap();
    assert!(cluster.client.get_job(&id).await.unwrap().is_some());

    cluster.clock.advance(Duration::from_secs(2));
    server.housekeeping_once().await.unwrap();
    assert!(cluster.client.get_job(&id).await.unwrap().is_none());
    server.stop().await;
}

#[tokio::test]
async fn auto_delete_ignores_statuses_outside_the_configured_set() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(), |c| {
        c.auto_delete_period(Duration::from_secs(60))
            .auto_delete_statuses(vec![JobStatus::Completed, JobStatus::Error])
    });

    let stopped = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    let errored = cluster
        .client
        .add(JobConfig::builder("quick").build())
        .await
        .unwrap();
    cluster.store.claim_eligible(&ProcessId::generate(), 2).await.unwrap();
    cluster.store.set_final(&stopped, JobStatus::Stopped, None).await.unwrap();
    cluster
        .store
        .set_final(&errored, JobStatus::Error, Some("boom".into()))
        .await
        .unwrap();

    cluster.clock.advance(Duration::from_secs(120));
    server.housekeeping_once().await.unwrap();
    assert!(cluster.client.get_job(&stopped).await.unwrap().is_some());
    assert!(cluster.client.get_job(&errored).await.unwrap().is_none());
    server.stop().await;
}
