//! Integration tests for unit-of-work failures, retries, and exhaustion.

mod helpers;

use std::time::Duration;

use dlhub_entity::{FileStage, JobStage};
use dlhub_worker::runner::recover_stalled_jobs;

use helpers::{Harness, test_config};

#[tokio::test(start_paused = true)]
async fn test_failure_on_second_file_fails_job() {
    let mut config = test_config();
    config.queue.max_attempts = 1;
    let harness = Harness::with_config(config);
    harness.fetcher.fail(2, u32::MAX);

    let job_id = harness.submit(vec![1, 2, 3]).await;
    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    harness.wait_for_queue(|s| s.failed == 1).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Failed);
    assert!(record.error.as_deref().unwrap().contains("file 2"));
    assert_eq!(record.progress.current, 1);
    assert!(record.completed_at.is_some());
    assert!(record.download_url.is_none());
    assert_eq!(record.files[0].status, FileStage::Completed);
    assert_eq!(record.files[1].status, FileStage::Failed);
    assert_eq!(record.files[2].status, FileStage::Queued);
    assert_eq!(harness.fetcher.calls(&job_id), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_exhausts_all_attempts() {
    let harness = Harness::new();
    harness.fetcher.fail(2, u32::MAX);

    let job_id = harness.submit(vec![1, 2, 3]).await;
    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    harness.wait_for_queue(|s| s.failed == 1).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Failed);
    assert_eq!(record.progress.current, 1);
    assert_eq!(harness.fetcher.calls(&job_id), vec![1, 2, 2, 2]);

    let history = harness.store.history(&job_id);
    assert_eq!(history.iter().filter(|r| r.is_terminal()).count(), 1);
    assert!(history.last().unwrap().is_terminal());

    let envelope = harness.queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(envelope.attempts_made, 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_on_redelivery() {
    let harness = Harness::new();
    harness.fetcher.fail(2, 1);

    let job_id = harness.submit(vec![1, 2, 3]).await;
    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Completed);
    assert!(record.error.is_none());
    assert_eq!(harness.fetcher.calls(&job_id), vec![1, 2, 2, 3]);

    let interim_error = harness
        .store
        .history(&job_id)
        .iter()
        .any(|r| r.status == JobStage::Processing && r.error.is_some());
    assert!(interim_error);

    let envelope = harness.queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(envelope.attempts_made, 2);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_is_retried_locally() {
    let harness = Harness::new();
    let job_id = harness.submit(vec![1, 2]).await;
    harness.store.fail_next_writes(2);

    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Completed);
    let envelope = harness.queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(envelope.attempts_made, 1);
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_on_last_attempt_marks_failed() {
    let mut config = test_config();
    config.queue.max_attempts = 1;
    config.queue.lease_seconds = 1;
    let harness = Harness::with_config(config);
    let job_id = harness.submit(vec![1, 2]).await;

    // A worker claims the job and dies without settling it.
    harness.queue.claim().await.unwrap().unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    let exhausted = recover_stalled_jobs(&harness.queue, harness.handler.as_ref())
        .await
        .unwrap();
    assert_eq!(exhausted, 1);

    let record = harness.downloads.get_status(&job_id).await.unwrap();
    assert_eq!(record.status, JobStage::Failed);
    assert!(record.error.unwrap().contains("Lease expired"));
    assert!(harness.fetcher.calls(&job_id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_with_attempts_left_is_redelivered() {
    let mut config = test_config();
    config.queue.lease_seconds = 1;
    let harness = Harness::with_config(config);
    let job_id = harness.submit(vec![1]).await;

    harness.queue.claim().await.unwrap().unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    // Startup recovery requeues the orphaned job.
    let pool = harness.start_pool("w2");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Completed);
    let envelope = harness.queue.get(&job_id).await.unwrap().unwrap();
    assert_eq!(envelope.attempts_made, 2);
}
