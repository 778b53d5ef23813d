//! Integration tests for subscriber registration and progress fan-out.

mod helpers;

use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use dlhub_core::error::ErrorKind;
use dlhub_entity::JobStage;
use dlhub_realtime::Delivery;

use helpers::Harness;

fn drain(rx: &mut Receiver<Delivery>) -> Vec<Delivery> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(delivery) => out.push(delivery),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return out,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

fn for_subscriber<'a>(deliveries: &'a [Delivery], id: &str) -> Vec<&'a Delivery> {
    deliveries.iter().filter(|d| d.subscriber_id == id).collect()
}

#[tokio::test(start_paused = true)]
async fn test_both_subscribers_receive_every_event() {
    let harness = Harness::new();
    let mut rx = harness.notifier.subscribe();
    let job_id = harness.submit(vec![1, 2]).await;
    harness.subscriptions.subscribe(&job_id, "conn-a").await.unwrap();
    harness.subscriptions.subscribe(&job_id, "conn-b").await.unwrap();

    let pool = harness.start_pool("w1");
    harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    let deliveries = drain(&mut rx);
    let a = for_subscriber(&deliveries, "conn-a");
    let b = for_subscriber(&deliveries, "conn-b");
    assert!(!a.is_empty());
    assert_eq!(a.len(), b.len());
    assert_eq!(a.last().unwrap().event.status, JobStage::Completed);
    assert_eq!(b.last().unwrap().event.status, JobStage::Completed);
    assert!(deliveries.iter().all(|d| d.event.job_id == job_id));
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_connection_stops_receiving() {
    let harness = Harness::new();
    let mut rx = harness.notifier.subscribe();
    let job_id = harness.submit(vec![1, 2, 3]).await;
    harness.subscriptions.subscribe(&job_id, "conn-a").await.unwrap();
    harness.subscriptions.subscribe(&job_id, "conn-b").await.unwrap();

    let pool = harness.start_pool("w1");

    // Leave as soon as conn-b has seen the first completed file.
    loop {
        let delivery = rx.recv().await.unwrap();
        if delivery.subscriber_id == "conn-b" && delivery.event.progress.current == 1 {
            break;
        }
    }
    harness.subscriptions.unsubscribe(&job_id, "conn-b").await.unwrap();

    harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    let remaining = drain(&mut rx);
    let a = for_subscriber(&remaining, "conn-a");
    assert!(for_subscriber(&remaining, "conn-b").is_empty());
    assert!(a.iter().any(|d| d.event.progress.current == 2));
    assert_eq!(a.last().unwrap().event.status, JobStage::Completed);

    let subscribers = harness.subscriptions.subscribers(&job_id).await.unwrap();
    assert_eq!(subscribers.into_iter().collect::<Vec<_>>(), vec!["conn-a"]);
}

#[tokio::test(start_paused = true)]
async fn test_job_without_subscribers_still_completes() {
    let harness = Harness::new();
    let mut rx = harness.notifier.subscribe();
    let job_id = harness.submit(vec![1]).await;

    let pool = harness.start_pool("w1");
    let record = harness.wait_for_terminal(&job_id).await;
    pool.stop().await;

    assert_eq!(record.status, JobStage::Completed);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_idle_subscriptions_expire() {
    let mut config = helpers::test_config();
    config.registry.idle_ttl_seconds = 60;
    let harness = Harness::with_config(config);

    harness.subscriptions.subscribe("job-1", "conn-a").await.unwrap();
    tokio::time::advance(Duration::from_secs(45)).await;
    harness.subscriptions.subscribe("job-1", "conn-b").await.unwrap();

    // The second subscribe re-armed the window for the whole set.
    tokio::time::advance(Duration::from_secs(45)).await;
    assert_eq!(harness.subscriptions.subscribers("job-1").await.unwrap().len(), 2);

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(harness.subscriptions.subscribers("job-1").await.unwrap().is_empty());
    assert_eq!(harness.registry.purge_expired(), 0);
}

#[tokio::test]
async fn test_blank_subscriber_rejected() {
    let harness = Harness::new();
    let err = harness
        .subscriptions
        .subscribe("job-1", "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
