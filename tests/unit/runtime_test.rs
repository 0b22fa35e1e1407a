//! Tests for tokio spawner and status API

use std::sync::Arc;
use std::time::Duration;

use github_throttle::core::{
    ApiError, ApiResponse, BackoffPolicy, QuotaTracker, RequestScheduler, ResponseCache, Spawn,
};
use github_throttle::runtime::api::{health, snapshot};
use github_throttle::runtime::tokio_spawner::TokioSpawner;
use github_throttle::util::ManualClock;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_owned_runtime_spawner() {
    let spawner = TokioSpawner::with_worker_threads(1).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send("ran").unwrap();
    });
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "ran");
}

#[test]
fn test_health_reports_exhausted_classes() {
    let tracker = QuotaTracker::new(Arc::new(ManualClock::at_secs(1_000)));
    assert!(health(&tracker).ok);

    tracker.record_usage("core", 60, 12, Some(2_000));
    tracker.record_usage("search", 10, 0, Some(1_060));
    let report = health(&tracker);
    assert!(report.ok);
    assert_eq!(report.rate_limited.len(), 1);
    assert_eq!(report.rate_limited[0].as_str(), "search");

    tracker.record_usage("core", 60, 0, Some(2_000));
    assert!(!health(&tracker).ok);
}

#[tokio::test]
async fn test_snapshot_summarizes_scheduler() {
    let clock = Arc::new(ManualClock::at_secs(1_000));
    let tracker = Arc::new(QuotaTracker::new(clock.clone()));
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(300), clock));
    let scheduler = RequestScheduler::new(
        tracker,
        cache,
        BackoffPolicy::default(),
        TokioSpawner::current(),
    );

    let handle = scheduler
        .submit_cached("core", "analysis:octo/app", false, || async {
            Ok::<_, ApiError>(ApiResponse::ok(vec![1_u32, 2, 3]).with_rate_limit(
                github_throttle::core::RateLimitInfo::new(5_000, 4_999, Some(4_600)),
            ))
        })
        .unwrap();
    assert_eq!(handle.wait().await.unwrap(), vec![1, 2, 3]);

    let snap = snapshot(&scheduler);
    assert!(snap.authenticated);
    assert_eq!(snap.cache_entries, 1);
    assert_eq!(snap.stats.completed, 1);
    assert_eq!(snap.queue_depths.get("core"), Some(&0));
    assert_eq!(snap.quotas.len(), 1);

    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["quotas"][0]["remaining"], 4_999);
}
