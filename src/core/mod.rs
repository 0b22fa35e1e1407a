//! Quota tracking, backoff, caching, and the request scheduler.

pub mod audit;
pub mod backoff;
pub mod cache;
pub mod error;
pub mod executor;
pub mod quota;
pub mod response;
pub mod retry;
pub mod scheduler;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use backoff::{BackoffPolicy, FixedJitter, JitterSource, RandomJitter};
pub use cache::{analysis_key, files_key, CacheEntry, ResponseCache, DEFAULT_CACHE_TTL};
pub use error::{AppResult, ThrottleError};
pub use executor::{ApiOperation, BlockingOperation, OperationResult};
pub use quota::{QuotaRecord, QuotaTracker, DEFAULT_AUTHENTICATED_THRESHOLD, DEFAULT_FALLBACK_WAIT};
pub use response::{ApiError, ApiResponse, ErrorKind, RateLimitInfo};
pub use retry::{run_async, run_blocking, RetryDecision, RetryDriver};
pub use scheduler::{
    OperationHandle, OperationQueue, RequestScheduler, SchedulerOptions, SchedulerStats, Spawn,
    DEFAULT_MAX_QUEUE_DEPTH,
};
