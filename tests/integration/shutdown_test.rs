//! Integration tests for graceful shutdown and hand-over between workers.

mod helpers;

use std::time::Duration;

use dlhub_core::traits::StatusStore;
use dlhub_entity::JobStage;

use helpers::{Harness, test_config};

async fn wait_for_processing(harness: &Harness, job_id: &str) {
    for _ in 0..10_000 {
        let record = harness.store.get(job_id).await.unwrap().unwrap();
        if record.status == JobStage::Processing {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("job {job_id} never started");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_job_finish() {
    let mut config = test_config();
    config.worker.concurrency = 1;
    let harness = Harness::with_config(config);

    let first = harness.submit(vec![1, 2, 3]).await;
    let second = harness.submit(vec![4]).await;

    let pool = harness.start_pool("w1");
    wait_for_processing(&harness, &first).await;
    pool.stop().await;

    let record = harness.downloads.get_status(&first).await.unwrap();
    assert_eq!(record.status, JobStage::Completed);
    assert_eq!(record.progress.current, 3);

    let untouched = harness.downloads.get_status(&second).await.unwrap();
    assert_eq!(untouched.status, JobStage::Queued);

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_next_worker_picks_up_remaining_jobs() {
    let mut config = test_config();
    config.worker.concurrency = 1;
    let harness = Harness::with_config(config);

    let mut ids = Vec::new();
    for file_id in 1..=3 {
        ids.push(harness.submit(vec![file_id]).await);
    }

    let first = harness.start_pool("w1");
    wait_for_processing(&harness, &ids[0]).await;
    first.stop().await;

    let second = harness.start_pool("w2");
    for id in &ids {
        let record = harness.wait_for_terminal(id).await;
        assert_eq!(record.status, JobStage::Completed);
    }
    second.stop().await;

    for id in &ids {
        let envelope = harness.queue.get(id).await.unwrap().unwrap();
        assert_eq!(envelope.attempts_made, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_idle_pool_stops_promptly() {
    let harness = Harness::new();
    let pool = harness.start_pool("w1");
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(1), pool.stop())
        .await
        .unwrap();

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!(stats.active, 0);
}
