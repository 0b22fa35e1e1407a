//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::ApiError;
use crate::util::serde::{OperationId, ResourceClass};

/// Errors surfaced to callers of the scheduler.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// A retryable failure persisted past the retry budget.
    #[error("operation {operation_id} on `{resource_class}` failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Operation identifier.
        operation_id: OperationId,
        /// Resource class the operation ran against.
        resource_class: ResourceClass,
        /// Total attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: ApiError,
    },
    /// The collaborator reported a failure that is never retried.
    #[error("operation {operation_id} on `{resource_class}` failed on attempt {attempts}: {source}")]
    Permanent {
        /// Operation identifier.
        operation_id: OperationId,
        /// Resource class the operation ran against.
        resource_class: ResourceClass,
        /// Attempts made before the failure, including it.
        attempts: u32,
        /// The permanent error.
        #[source]
        source: ApiError,
    },
    /// The collaborator panicked. The lane keeps serving later operations.
    #[error("operation {operation_id} on `{resource_class}` panicked: {message}")]
    Panicked {
        /// Operation identifier.
        operation_id: OperationId,
        /// Resource class the operation ran against.
        resource_class: ResourceClass,
        /// Panic payload, when it was a string.
        message: String,
    },
    /// The per-class queue is at capacity.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// The caller stopped waiting for the result.
    #[error("timed out waiting for operation result")]
    Timeout,
    /// The result channel closed before the operation resolved.
    #[error("operation dropped before resolution")]
    Cancelled,
    /// The scheduler no longer accepts or runs work.
    #[error("scheduler shut down")]
    Shutdown,
    /// A cached value could not be encoded or decoded.
    #[error("cache error: {0}")]
    Cache(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ThrottleError {
    /// The collaborator error behind a terminal failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&ApiError> {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Permanent { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Attempts made before a terminal failure.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetriesExhausted { attempts, .. } | Self::Permanent { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
