//! Exponential backoff with proportional jitter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;

/// Source of the uniform `[0, 1)` draw used for jitter.
pub trait JitterSource: Send + Sync + fmt::Debug {
    /// Draw a value in `[0, 1)`.
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Constant jitter draw, for deterministic tests and benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Retry budget and delay curve shared by every call shape.
///
/// `compute_delay(n) = min(base * 2^n, max) * (1 + jitter_fraction * U(0,1))`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
    jitter: Arc<dyn JitterSource>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    /// Create a policy with random jitter.
    ///
    /// The jitter fraction is clamped to `[0, 1]`; non-finite values are
    /// treated as zero.
    #[must_use]
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Self {
        let jitter_fraction = if jitter_fraction.is_finite() {
            jitter_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter_fraction,
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Build from validated retry configuration.
    #[must_use]
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            cfg.max_retries,
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
            cfg.jitter_fraction,
        )
    }

    /// Replace the jitter source.
    #[must_use]
    pub fn with_jitter_source(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry, without jitter.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap applied before jitter.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Upper bound of the jitter as a fraction of the capped delay.
    #[must_use]
    pub const fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// `min(base * 2^attempt, max)`, saturating at the cap.
    #[must_use]
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |raw| raw.min(self.max_delay))
    }

    /// Delay before retry number `attempt` (zero-indexed), jitter included.
    ///
    /// A draw outside `[0, 1]` is clamped and a NaN draw counts as zero.
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let sample = self.jitter.sample();
        let draw = if sample.is_nan() { 0.0 } else { sample.clamp(0.0, 1.0) };
        self.jittered(self.capped_delay(attempt), draw)
    }

    /// Worst-case time spent in backoff across the whole retry budget.
    #[must_use]
    pub fn max_total_backoff(&self) -> Duration {
        (0..self.max_retries)
            .map(|attempt| self.jittered(self.capped_delay(attempt), 1.0))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    fn jittered(&self, capped: Duration, draw: f64) -> Duration {
        let extra = Duration::try_from_secs_f64(capped.as_secs_f64() * self.jitter_fraction * draw)
            .unwrap_or(Duration::MAX);
        capped.saturating_add(extra)
    }
}
