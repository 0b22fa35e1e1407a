//! Tests for error types

use github_throttle::core::{ApiError, ErrorKind, ThrottleError};
use github_throttle::util::ResourceClass;

#[test]
fn test_queue_full_error() {
    let err = ThrottleError::QueueFull("core".to_string());
    assert_eq!(format!("{}", err), "queue full: core");
}

#[test]
fn test_retries_exhausted_carries_context() {
    let err = ThrottleError::RetriesExhausted {
        operation_id: 9,
        resource_class: ResourceClass::search(),
        attempts: 3,
        source: ApiError::rate_limited("API rate limit exceeded").with_status(403),
    };
    assert_eq!(
        format!("{}", err),
        "operation 9 on `search` failed after 3 attempts: rate limited error: API rate limit exceeded"
    );
    assert_eq!(err.attempts(), Some(3));
    assert_eq!(err.last_error().unwrap().status, Some(403));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_panicked_error_names_operation() {
    let err = ThrottleError::Panicked {
        operation_id: 4,
        resource_class: ResourceClass::core(),
        message: "index out of bounds".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "operation 4 on `core` panicked: index out of bounds"
    );
    assert!(err.last_error().is_none());
    assert!(err.attempts().is_none());
}

#[test]
fn test_non_terminal_errors_have_no_source() {
    assert!(ThrottleError::Timeout.last_error().is_none());
    assert!(ThrottleError::Shutdown.attempts().is_none());
    assert_eq!(format!("{}", ThrottleError::Cancelled), "operation dropped before resolution");
}

#[test]
fn test_status_classification() {
    assert_eq!(ApiError::from_status(429, "slow").kind, ErrorKind::RateLimited);
    assert_eq!(ApiError::from_status(502, "bad gateway").kind, ErrorKind::TransientOther);
    assert_eq!(ApiError::from_status(404, "missing").kind, ErrorKind::Permanent);
    assert!(!ApiError::from_status(401, "bad credentials").is_retryable());
}
