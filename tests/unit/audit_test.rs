//! Tests for audit sink

use github_throttle::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(1, "core", AuditAction::Submit, Some("queued".to_string()));

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].operation_id, 1);
    assert_eq!(events[0].action, AuditAction::Submit);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event(1, "core", AuditAction::Submit, None));
    sink.record(build_audit_event(2, "core", AuditAction::Submit, None));
    sink.record(build_audit_event(3, "search", AuditAction::Submit, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].operation_id, 2); // First one popped
    assert_eq!(events[1].operation_id, 3);
}

#[test]
fn test_clones_share_buffer() {
    let sink = InMemoryAuditSink::new(8);
    let other = sink.clone();
    other.record(build_audit_event(4, "core", AuditAction::Start, None));
    other.record(build_audit_event(5, "core", AuditAction::Start, None));
    other.record(build_audit_event(4, "core", AuditAction::Complete, None));

    let actions: Vec<_> = sink.events_for(4).into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Start, AuditAction::Complete]);
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(7, "search", AuditAction::Fail, Some("permanent".to_string()));

    assert_eq!(event.operation_id, 7);
    assert_eq!(event.resource_class.as_str(), "search");
    assert_eq!(event.action.to_string(), "fail");
    assert_eq!(event.detail, Some("permanent".to_string()));
    assert_eq!(event.event_id.len(), 36);
    assert!(event.created_at_ms > 0);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "fail");
    assert_eq!(json["resource_class"], "search");
}
