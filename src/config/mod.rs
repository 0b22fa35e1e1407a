//! Configuration models for retries, quotas, caching, and queueing.

pub mod throttle;

pub use throttle::{CacheConfig, QueueConfig, QuotaConfig, QuotaSeed, RetryConfig, ThrottleConfig};
