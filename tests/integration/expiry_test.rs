//! Integration tests for status record expiry and queue retention.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use dlhub_core::error::ErrorKind;
use dlhub_core::traits::StatusStore;
use dlhub_entity::{JobStage, StatusPatch};
use dlhub_store::memory::MemoryStatusStore;

use helpers::{Harness, RecordingStore, test_config};

fn harness_with_retention(retention: Duration) -> Harness {
    let store = MemoryStatusStore::with_retention(1_000, retention);
    Harness::with_store(test_config(), Arc::new(RecordingStore::new(store)))
}

#[tokio::test]
async fn test_finished_job_expires_after_retention() {
    let harness = harness_with_retention(Duration::from_millis(400));
    let job_id = harness.submit(vec![1, 2]).await;

    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;
    assert_eq!(record.status, JobStage::Completed);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let err = harness.downloads.get_status(&job_id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(harness.downloads.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_write_rearms_retention() {
    let harness = harness_with_retention(Duration::from_millis(300));
    let job_id = harness.submit(vec![1]).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    harness
        .store
        .upsert(&job_id, StatusPatch::new().stage(JobStage::Processing))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let record = harness.downloads.get_status(&job_id).await.unwrap();
    assert_eq!(record.status, JobStage::Processing);
}

#[tokio::test(start_paused = true)]
async fn test_queue_keeps_bounded_completed_history() {
    let mut config = test_config();
    config.queue.completed_retention_count = 2;
    let harness = Harness::with_config(config);

    let mut ids = Vec::new();
    for file_id in 1..=4 {
        ids.push(harness.submit(vec![file_id]).await);
    }

    let pool = harness.start_pool("w1");
    for id in &ids {
        harness.wait_for_terminal(id).await;
    }
    let stats = harness.wait_for_queue(|s| s.active == 0 && s.waiting == 0).await;
    pool.stop().await;

    assert_eq!(stats.completed, 2);
    assert_eq!(stats.waiting, 0);
    // Status records outlive queue bookkeeping.
    for id in &ids {
        let record = harness.downloads.get_status(id).await.unwrap();
        assert_eq!(record.status, JobStage::Completed);
    }
}
