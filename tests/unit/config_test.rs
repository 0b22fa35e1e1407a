//! Tests for configuration validation

use github_throttle::config::{QuotaSeed, RetryConfig, ThrottleConfig};

#[test]
fn test_default_config_validation() {
    let cfg = ThrottleConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.retry.base_delay_ms, 1_000);
    assert_eq!(cfg.retry.max_delay_ms, 300_000);
    assert_eq!(cfg.quota.fallback_wait_secs, 3_600);
    assert_eq!(cfg.cache.ttl_secs, 300);
    assert_eq!(cfg.cache.max_entries, None);
}

#[test]
fn test_retry_config_invalid_base_delay() {
    let invalid = RetryConfig {
        base_delay_ms: 0,
        ..RetryConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_retry_config_invalid_cap() {
    let invalid = RetryConfig {
        base_delay_ms: 2_000,
        max_delay_ms: 1_000,
        ..RetryConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_retry_config_invalid_jitter() {
    let invalid = RetryConfig {
        jitter_fraction: 1.5,
        ..RetryConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_seed_remaining_above_limit() {
    let mut cfg = ThrottleConfig::default();
    cfg.quota.initial.push(QuotaSeed {
        resource_class: "graphql".into(),
        limit: 10,
        remaining: 11,
    });
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("quota:"), "{err}");
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "retry": { "max_retries": 4, "base_delay_ms": 500 },
        "cache": { "ttl_secs": 60, "max_entries": 256 },
        "quota": { "initial": [ { "resource_class": "graphql", "limit": 5000, "remaining": 5000 } ] }
    }"#;

    let cfg = ThrottleConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.retry.max_retries, 4);
    assert_eq!(cfg.retry.base_delay_ms, 500);
    assert_eq!(cfg.retry.max_delay_ms, 300_000);
    assert_eq!(cfg.cache.max_entries, Some(256));
    assert_eq!(cfg.quota.initial.len(), 1);
    assert_eq!(cfg.queue.max_queue_depth, 1000);
}

#[test]
fn test_config_from_json_invalid() {
    assert!(ThrottleConfig::from_json_str("{ not json").is_err());
    assert!(ThrottleConfig::from_json_str(r#"{ "queue": { "max_queue_depth": 0 } }"#).is_err());
}

#[test]
fn test_config_from_lookup() {
    let cfg = ThrottleConfig::from_lookup(|name| match name {
        "GITHUB_THROTTLE_JITTER_FRACTION" => Some("0".into()),
        "GITHUB_THROTTLE_FALLBACK_WAIT_SECS" => Some("120".into()),
        "GITHUB_THROTTLE_MAX_QUEUE_DEPTH" => Some("8".into()),
        _ => None,
    })
    .unwrap();
    assert!(cfg.retry.jitter_fraction.abs() < f64::EPSILON);
    assert_eq!(cfg.quota.fallback_wait_secs, 120);
    assert_eq!(cfg.queue.max_queue_depth, 8);
}
