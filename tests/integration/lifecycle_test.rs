//! Integration tests for the happy-path job lifecycle.

mod helpers;

use dlhub_core::error::ErrorKind;
use dlhub_entity::{FileStage, JobStage, Progress};
use dlhub_service::SubmitRequest;

use helpers::Harness;

#[tokio::test(start_paused = true)]
async fn test_batch_completes_with_download_link() {
    let harness = Harness::new();
    let job_id = harness.submit(vec![70000, 70001]).await;

    let queued = harness.downloads.get_status(&job_id).await.unwrap();
    assert_eq!(queued.status, JobStage::Queued);
    assert_eq!(queued.progress.total, 2);

    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Completed);
    assert_eq!(record.progress, Progress::new(2, 2));
    assert_eq!(record.progress.percentage, 100);
    assert_eq!(record.file_ids(), vec![70000, 70001]);
    for file in &record.files {
        assert_eq!(file.status, FileStage::Completed);
        assert!(file.size_bytes.is_some());
    }
    assert!(record.completed_at.is_some());
    assert!(record.download_url.is_some());
    assert!(record.error.is_none());
    assert_eq!(record.created_at, queued.created_at);

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_is_rejected_before_queueing() {
    let harness = Harness::new();
    let err = harness
        .downloads
        .submit(SubmitRequest::new(Vec::new()))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(harness.queue.stats().await.unwrap().waiting, 0);
    assert!(harness.downloads.list_all().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_are_monotonic_and_ordered() {
    let harness = Harness::new();
    let job_id = harness.submit(vec![3, 1, 2, 1]).await;

    let pool = harness.start_pool("w1");
    harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    let history = harness.store.history(&job_id);
    assert!(history.len() > 4);

    let mut last_current = 0;
    let mut terminal_seen = false;
    for snapshot in &history {
        assert!(snapshot.progress.current >= last_current);
        assert!(snapshot.progress.current <= snapshot.progress.total);
        last_current = snapshot.progress.current;

        if terminal_seen {
            assert_eq!(snapshot.status, JobStage::Completed);
        }
        terminal_seen |= snapshot.is_terminal();

        let completed = snapshot.completed_prefix();
        assert_eq!(
            snapshot
                .files
                .iter()
                .filter(|f| f.status == FileStage::Completed)
                .count(),
            completed,
            "files completed out of order"
        );
    }
    assert_eq!(harness.fetcher.calls(&job_id), vec![3, 1, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_status_reads_are_stable() {
    let harness = Harness::new();
    let job_id = harness.submit(vec![1]).await;

    let pool = harness.start_pool("w1");
    harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    let first = harness.downloads.get_status(&job_id).await.unwrap();
    let second = harness.downloads.get_status(&job_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_jobs_each_complete_once() {
    let harness = Harness::new();
    let mut jobs = Vec::new();
    for n in 0..8 {
        jobs.push(harness.submit(vec![n, n + 100]).await);
    }

    let pool = harness.start_pool("w1");
    for job_id in &jobs {
        let record = harness.wait_for_terminal(job_id).await;
        assert_eq!(record.status, JobStage::Completed);
    }
    pool.stop().await;

    for job_id in &jobs {
        assert_eq!(harness.fetcher.calls(job_id).len(), 2);
        let terminal_writes = harness
            .store
            .history(job_id)
            .iter()
            .filter(|r| r.is_terminal())
            .count();
        assert_eq!(terminal_writes, 1);
    }
    assert_eq!(harness.downloads.list_all().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let harness = Harness::new();
    let err = harness.downloads.get_status("nope").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
