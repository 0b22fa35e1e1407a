//! The retry loop shared by the queued and blocking call shapes.
//!
//! [`RetryDriver`] owns every policy decision: how long to wait for quota,
//! which observations update the tracker, and whether a failure earns
//! another attempt. [`run_async`] and [`run_blocking`] differ only in how
//! they sleep.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    build_audit_event, ApiError, ApiOperation, AuditAction, AuditSink, BackoffPolicy,
    BlockingOperation, OperationResult, QuotaTracker, ThrottleError,
};
use crate::util::serde::{OperationId, ResourceClass};

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the delay, then re-issue the same operation.
    Retry(Duration),
    /// Stop and surface the error.
    Fail(ThrottleError),
}

/// Per-operation retry state.
pub struct RetryDriver {
    tracker: Arc<QuotaTracker>,
    policy: BackoffPolicy,
    operation_id: OperationId,
    resource_class: ResourceClass,
    retries: u32,
    audit: Option<Arc<dyn AuditSink>>,
}

impl fmt::Debug for RetryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryDriver")
            .field("operation_id", &self.operation_id)
            .field("resource_class", &self.resource_class)
            .field("retries", &self.retries)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryDriver {
    /// Start tracking a fresh operation.
    #[must_use]
    pub fn new(
        tracker: Arc<QuotaTracker>,
        policy: BackoffPolicy,
        operation_id: OperationId,
        resource_class: ResourceClass,
    ) -> Self {
        Self {
            tracker,
            policy,
            operation_id,
            resource_class,
            retries: 0,
            audit: None,
        }
    }

    /// Record a `retry` audit event for every backoff.
    #[must_use]
    pub fn with_audit(mut self, audit: Option<Arc<dyn AuditSink>>) -> Self {
        self.audit = audit;
        self
    }

    /// Operation identifier.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Resource class the operation runs against.
    #[must_use]
    pub const fn resource_class(&self) -> &ResourceClass {
        &self.resource_class
    }

    /// Retries performed so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Retries still available.
    #[must_use]
    pub const fn retries_left(&self) -> u32 {
        self.policy.max_retries().saturating_sub(self.retries)
    }

    /// Attempts started so far, counting the one in progress.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.retries + 1
    }

    /// Time to wait for quota before the next attempt.
    #[must_use]
    pub fn quota_wait(&self) -> Duration {
        let wait = self.tracker.wait_time(self.resource_class.as_str());
        if !wait.is_zero() {
            tracing::info!(
                operation_id = self.operation_id,
                resource_class = %self.resource_class,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                attempt = self.attempt(),
                "quota exhausted, waiting for reset"
            );
        }
        wait
    }

    /// Feed rate-limit metadata from an attempt into the tracker.
    ///
    /// Runs for successes and failures alike; outcomes without metadata
    /// leave the tracker untouched. Values are recorded against the class
    /// the server named, falling back to the operation's own class.
    pub fn observe<T>(&self, outcome: &OperationResult<T>) {
        let info = match outcome {
            Ok(response) => response.rate_limit.as_ref(),
            Err(err) => err.rate_limit.as_ref(),
        };
        if let Some(info) = info {
            let resource_class = info.resource.as_ref().unwrap_or(&self.resource_class);
            self.tracker.record_from(resource_class, info);
        }
    }

    /// Decide whether `err` earns another attempt.
    pub fn on_failure(&mut self, err: ApiError) -> RetryDecision {
        let attempts = self.attempt();
        if !err.is_retryable() {
            tracing::error!(
                operation_id = self.operation_id,
                resource_class = %self.resource_class,
                attempts,
                error = %err,
                "operation failed permanently"
            );
            return RetryDecision::Fail(ThrottleError::Permanent {
                operation_id: self.operation_id,
                resource_class: self.resource_class.clone(),
                attempts,
                source: err,
            });
        }
        if self.retries_left() == 0 {
            tracing::error!(
                operation_id = self.operation_id,
                resource_class = %self.resource_class,
                attempts,
                error = %err,
                "operation failed after exhausting retries"
            );
            return RetryDecision::Fail(ThrottleError::RetriesExhausted {
                operation_id: self.operation_id,
                resource_class: self.resource_class.clone(),
                attempts,
                source: err,
            });
        }
        let delay = self.policy.compute_delay(self.retries);
        self.retries += 1;
        tracing::warn!(
            operation_id = self.operation_id,
            resource_class = %self.resource_class,
            attempt = attempts,
            max_attempts = self.policy.max_retries() + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retryable failure, backing off"
        );
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(
                self.operation_id,
                &self.resource_class,
                AuditAction::Retry,
                Some(format!("attempt {attempts} failed ({}), retrying in {delay:?}", err.kind)),
            ));
        }
        RetryDecision::Retry(delay)
    }
}

/// Drive `op` to completion on the async runtime.
///
/// # Errors
///
/// Returns [`ThrottleError::Permanent`] or [`ThrottleError::RetriesExhausted`]
/// carrying the last collaborator error.
pub async fn run_async<T, O>(driver: &mut RetryDriver, op: &mut O) -> Result<T, ThrottleError>
where
    T: Send + 'static,
    O: ApiOperation<T>,
{
    loop {
        let wait = driver.quota_wait();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        let outcome = op.call().await;
        driver.observe(&outcome);
        match outcome {
            Ok(response) => return Ok(response.value),
            Err(err) => match driver.on_failure(err) {
                RetryDecision::Retry(delay) => tokio::time::sleep(delay).await,
                RetryDecision::Fail(err) => return Err(err),
            },
        }
    }
}

/// Drive `op` to completion, sleeping on the calling thread.
///
/// # Errors
///
/// Same as [`run_async`].
pub fn run_blocking<T, O>(driver: &mut RetryDriver, op: &mut O) -> Result<T, ThrottleError>
where
    O: BlockingOperation<T>,
{
    loop {
        let wait = driver.quota_wait();
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        let outcome = op.call();
        driver.observe(&outcome);
        match outcome {
            Ok(response) => return Ok(response.value),
            Err(err) => match driver.on_failure(err) {
                RetryDecision::Retry(delay) => std::thread::sleep(delay),
                RetryDecision::Fail(err) => return Err(err),
            },
        }
    }
}
