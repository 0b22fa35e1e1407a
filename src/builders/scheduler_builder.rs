//! Builders to construct the tracker, cache, and scheduler from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use crate::config::{CacheConfig, QuotaConfig, ThrottleConfig};
use crate::core::{
    AppResult, AuditSink, BackoffPolicy, QuotaRecord, QuotaTracker, RequestScheduler,
    ResponseCache, SchedulerOptions, Spawn, ThrottleError,
};
use crate::util::clock::{system_clock, Clock};

/// Build a quota tracker with the configured seeds and thresholds.
#[must_use]
pub fn build_tracker(cfg: &QuotaConfig, clock: Arc<dyn Clock>) -> QuotaTracker {
    cfg.initial.iter().fold(
        QuotaTracker::new(clock)
            .with_fallback_wait(Duration::from_secs(cfg.fallback_wait_secs))
            .with_authenticated_threshold(cfg.authenticated_limit_threshold),
        |tracker, seed| {
            tracker.with_seed(QuotaRecord::new(
                seed.resource_class.as_str(),
                seed.limit,
                seed.remaining,
                None,
            ))
        },
    )
}

/// Build a response cache holding JSON-encoded values.
#[must_use]
pub fn build_cache(cfg: &CacheConfig, clock: Arc<dyn Clock>) -> ResponseCache<Value> {
    let cache = ResponseCache::new(Duration::from_secs(cfg.ttl_secs), clock);
    match cfg.max_entries {
        Some(max) => cache.with_max_entries(max),
        None => cache,
    }
}

/// Validate `cfg` and assemble a scheduler sharing one tracker and cache.
///
/// # Errors
///
/// Returns [`ThrottleError::Config`] when validation fails.
pub fn build_scheduler<S>(
    cfg: &ThrottleConfig,
    clock: Arc<dyn Clock>,
    spawner: S,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<RequestScheduler<S>, ThrottleError>
where
    S: Spawn,
{
    cfg.validate().map_err(ThrottleError::Config)?;

    let tracker = Arc::new(build_tracker(&cfg.quota, Arc::clone(&clock)));
    let cache = Arc::new(build_cache(&cfg.cache, clock));
    let policy = BackoffPolicy::from_config(&cfg.retry);
    let options = SchedulerOptions {
        max_queue_depth: cfg.queue.max_queue_depth,
        audit,
    };
    Ok(RequestScheduler::with_options(
        tracker, cache, policy, spawner, options,
    ))
}

/// Load configuration from the environment and build a scheduler on the
/// system clock.
///
/// # Errors
///
/// Returns an error if an environment override is malformed or the
/// resulting configuration is invalid.
pub fn build_scheduler_from_env<S>(spawner: S) -> AppResult<RequestScheduler<S>>
where
    S: Spawn,
{
    let cfg = ThrottleConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading throttle configuration from environment")?;
    build_scheduler(&cfg, system_clock(), spawner, None).context("building request scheduler")
}
