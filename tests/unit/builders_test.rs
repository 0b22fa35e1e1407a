//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use github_throttle::builders::{build_cache, build_scheduler, build_tracker};
use github_throttle::config::{CacheConfig, QuotaConfig, ThrottleConfig};
use github_throttle::core::{Spawn, ThrottleError};
use github_throttle::util::ManualClock;

#[derive(Clone)]
struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

#[test]
fn test_tracker_seeded_from_config() {
    let tracker = build_tracker(&QuotaConfig::default(), Arc::new(ManualClock::at_secs(0)));
    let core = tracker.status("core").unwrap();
    assert_eq!((core.limit, core.remaining, core.reset_at), (60, 60, None));
    assert_eq!(tracker.status("search").unwrap().limit, 10);
    assert!(!tracker.has_record("graphql"));
    assert_eq!(tracker.status("graphql").unwrap().resource_class.as_str(), "core");
    assert!(!tracker.is_authenticated());
    assert_eq!(tracker.fallback_wait(), Duration::from_secs(3_600));
}

#[test]
fn test_bounded_cache_from_config() {
    let cfg = CacheConfig {
        ttl_secs: 30,
        max_entries: Some(1),
    };
    let cache = build_cache(&cfg, Arc::new(ManualClock::at_secs(0)));
    assert_eq!(cache.ttl(), Duration::from_secs(30));
    cache.set("a", serde_json::json!(1));
    cache.set("b", serde_json::json!(2));
    assert_eq!(cache.len(), 1);
    assert!(cache.has("b"));
}

#[tokio::test]
async fn test_build_scheduler_applies_config() {
    let mut cfg = ThrottleConfig::default();
    cfg.retry.max_retries = 4;
    let scheduler =
        build_scheduler(&cfg, Arc::new(ManualClock::at_secs(0)), TestSpawner, None).unwrap();
    assert_eq!(scheduler.policy().max_retries(), 4);
    assert_eq!(
        scheduler.format_status(),
        "CORE: 60/60 (reset: N/A) | SEARCH: 10/10 (reset: N/A)"
    );
}

#[tokio::test]
async fn test_build_scheduler_rejects_invalid_config() {
    let mut cfg = ThrottleConfig::default();
    cfg.cache.ttl_secs = 0;
    let result = build_scheduler(&cfg, Arc::new(ManualClock::at_secs(0)), TestSpawner, None);
    assert!(matches!(result, Err(ThrottleError::Config(_))));
}
