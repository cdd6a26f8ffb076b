// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim-and-dispatch specs: the full queued → running → completed path.

use crate::prelude::*;

struct Reporter;

#[async_trait]
impl JobHandler for Reporter {
    async fn run(&self, ctx: JobContext) -> Result<Outcome, JobFailure> {
        ctx.report_progress(50, Some("halfway".into())).await?;
        Ok(Outcome::Completed)
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("report", Arc::new(Reporter));
    registry
}

#[tokio::test]
async fn queued_job_is_claimed_executed_and_closed_out() {
    let mut cluster = Cluster::new();
    let server = cluster.server(registry(), |c| c);

    let id = cluster
        .client
        .add(
            JobConfig::builder("report")
                .args(serde_json::json!({ "shard": 3 }))
                .build(),
        )
        .await
        .unwrap();

    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.process_id.is_none());
    assert!(job.app_id.is_none());
    assert_eq!(job.invocation.args, serde_json::json!({ "shard": 3 }));

    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert!(
        job.status == JobStatus::Running || job.status.is_terminal(),
        "claimed job should be running or already done, was {}",
        job.status
    );

    let status = wait_for(&cluster.store, &id, Duration::from_secs(5), |s| {
        s.is_terminal()
    })
    .await;
    assert_eq!(status, JobStatus::Completed);

    let job = cluster.client.get_job(&id).await.unwrap().unwrap();
    assert!(job.process_id.is_none());
    assert!(job.command.is_none());
    assert!(job.ended_ms.is_some());
    let progress = cluster.client.get_progress(&id).await.unwrap().unwrap();
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.note.as_deref(), Some("halfway"));

    server.stop().await;
}

#[tokio::test]
async fn started_loops_drain_the_queue_without_manual_passes() {
    let mut cluster = Cluster::new();
    let server = Arc::new(cluster.server(registry(), |c| c));
    server.start();

    // A client built from the server's own store handle works the same as
    // one pointed at the backend directly.
    let client = JobClient::new(server.store());
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(client.add(JobConfig::builder("report").build()).await.unwrap());
    }

    for id in &ids {
        let status =
            wait_for(&cluster.store, id, Duration::from_secs(5), |s| s.is_terminal()).await;
        assert_eq!(status, JobStatus::Completed);
    }
    server.stop().await;
}

#[tokio::test]
async fn run_now_jobs_are_claimed_ahead_of_older_work() {
    let mut cluster = Cluster::new();
    // One slot and capacity one, so claim order is observable.
    let server = cluster.server(registry(), |c| c.max_runnable_jobs(1));

    let older = cluster
        .client
        .add(JobConfig::builder("report").build())
        .await
        .unwrap();
    let urgent = cluster
        .client
        .add(JobConfig::builder("report").build())
        .await
        .unwrap();
    assert_eq!(
        cluster.client.run_now(std::slice::from_ref(&urgent)).await.unwrap(),
        1
    );

    assert_eq!(server.dispatch_once().await.unwrap(), 1);
    let urgent_job = cluster.client.get_job(&urgent).await.unwrap().unwrap();
    assert!(urgent_job.status == JobStatus::Running || urgent_job.status.is_terminal());
    let older_job = cluster.client.get_job(&older).await.unwrap().unwrap();
    assert_eq!(older_job.status, JobStatus::Queued);

    wait_for(&cluster.store, &urgent, Duration::from_secs(5), |s| s.is_terminal()).await;
    server.stop().await;
}
