//! Tests for utility functions

use std::collections::HashMap;
use std::time::Duration;

use github_throttle::util::{now_ms, Clock, ManualClock, OperationId, ResourceClass, SystemClock};

#[test]
fn test_resource_class_names() {
    assert_eq!(ResourceClass::core().as_str(), "core");
    assert_eq!(ResourceClass::search().to_string(), "search");
    assert!(ResourceClass::from("core").is_core());
    assert!(!ResourceClass::new(ResourceClass::GRAPHQL).is_core());
    assert!(ResourceClass::new(ResourceClass::GRAPHQL).is_builtin());
    assert!(!ResourceClass::new("repos").is_builtin());
}

#[test]
fn test_resource_class_str_lookup() {
    let mut depths: HashMap<ResourceClass, usize> = HashMap::new();
    depths.insert(ResourceClass::search(), 3);
    assert_eq!(depths.get("search"), Some(&3));
}

#[test]
fn test_resource_class_serializes_as_string() {
    let json = serde_json::to_string(&ResourceClass::core()).unwrap();
    assert_eq!(json, "\"core\"");
    let back: ResourceClass = serde_json::from_str("\"graphql\"").unwrap();
    assert_eq!(back.as_str(), "graphql");
}

#[test]
fn test_manual_clock() {
    let clock = ManualClock::at_secs(100);
    let shared = clock.clone();
    shared.advance(Duration::from_millis(2_500));
    assert_eq!(clock.now_secs(), 102);
    clock.set(Duration::from_secs(7));
    assert_eq!(shared.since_epoch(), Duration::from_secs(7));
}

#[test]
fn test_system_clock_tracks_now_ms() {
    let secs = SystemClock.now_secs();
    let ms = now_ms();
    assert!(u128::from(secs) * 1_000 <= ms);
}

#[test]
fn test_operation_id() {
    let id: OperationId = 12345;
    assert_eq!(id, 12345);
}

#[test]
fn test_init_tracing_is_idempotent() {
    github_throttle::util::init_tracing();
    github_throttle::util::init_tracing();
    tracing::info!(resource_class = "core", "tracing initialized");
}
