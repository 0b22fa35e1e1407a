//! Throttle configuration structures.

use serde::{Deserialize, Serialize};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "GITHUB_THROTTLE_";

/// Retry budget and backoff curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the pre-jitter delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Upper bound of the added jitter as a fraction of the delay.
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
            jitter_fraction: 0.2,
        }
    }
}

/// Initial quota assumed for a class before any response is seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSeed {
    /// Resource class name.
    pub resource_class: String,
    /// Assumed limit.
    pub limit: u64,
    /// Assumed remaining requests.
    pub remaining: u64,
}

impl QuotaSeed {
    fn new(resource_class: &str, limit: u64) -> Self {
        Self {
            resource_class: resource_class.to_string(),
            limit,
            remaining: limit,
        }
    }
}

/// Quota tracking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Wait applied to an exhausted class with no reset instant, in seconds.
    pub fallback_wait_secs: u64,
    /// Core limit at or above which the token counts as authenticated.
    pub authenticated_limit_threshold: u64,
    /// Records installed at startup. Defaults to the anonymous core and search limits.
    pub initial: Vec<QuotaSeed>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            fallback_wait_secs: 3_600,
            authenticated_limit_threshold: 5_000,
            initial: vec![QuotaSeed::new("core", 60), QuotaSeed::new("search", 10)],
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
    /// Optional bound on stored entries.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: None,
        }
    }
}

/// Per-class queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued operations per resource class before rejection.
    pub max_queue_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: crate::core::DEFAULT_MAX_QUEUE_DEPTH,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Retry settings.
    pub retry: RetryConfig,
    /// Quota settings.
    pub quota: QuotaConfig,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Queue settings.
    pub queue: QueueConfig,
}

impl RetryConfig {
    /// Validate retry configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be greater than 0".into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be at least base_delay_ms".into());
        }
        if !self.jitter_fraction.is_finite() || !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("jitter_fraction must be within [0, 1]".into());
        }
        Ok(())
    }
}

impl QuotaConfig {
    /// Validate quota configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field or seed.
    pub fn validate(&self) -> Result<(), String> {
        if self.fallback_wait_secs == 0 {
            return Err("fallback_wait_secs must be greater than 0".into());
        }
        for seed in &self.initial {
            if seed.resource_class.trim().is_empty() {
                return Err("seed resource_class must not be empty".into());
            }
            if seed.remaining > seed.limit {
                return Err(format!(
                    "seed `{}` has remaining {} above limit {}",
                    seed.resource_class, seed.remaining, seed.limit
                ));
            }
        }
        Ok(())
    }
}

impl ThrottleConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first failure, prefixed with its section name.
    pub fn validate(&self) -> Result<(), String> {
        self.retry.validate().map_err(|e| format!("retry: {e}"))?;
        self.quota.validate().map_err(|e| format!("quota: {e}"))?;
        if self.cache.ttl_secs == 0 {
            return Err("cache: ttl_secs must be greater than 0".into());
        }
        if self.cache.max_entries == Some(0) {
            return Err("cache: max_entries must be greater than 0 when set".into());
        }
        if self.queue.max_queue_depth == 0 {
            return Err("queue: max_queue_depth must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `GITHUB_THROTTLE_*` environment variables,
    /// after loading a `.env` file if one is present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by variables resolved through `lookup`.
    ///
    /// Recognized names, each prefixed with [`ENV_PREFIX`]: `MAX_RETRIES`,
    /// `BASE_DELAY_MS`, `MAX_DELAY_MS`, `JITTER_FRACTION`,
    /// `FALLBACK_WAIT_SECS`, `AUTH_THRESHOLD`, `CACHE_TTL_SECS`,
    /// `CACHE_MAX_ENTRIES`, `MAX_QUEUE_DEPTH`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(v) = get("MAX_RETRIES") {
            cfg.retry.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("BASE_DELAY_MS") {
            cfg.retry.base_delay_ms = parse_var("BASE_DELAY_MS", &v)?;
        }
        if let Some(v) = get("MAX_DELAY_MS") {
            cfg.retry.max_delay_ms = parse_var("MAX_DELAY_MS", &v)?;
        }
        if let Some(v) = get("JITTER_FRACTION") {
            cfg.retry.jitter_fraction = parse_var("JITTER_FRACTION", &v)?;
        }
        if let Some(v) = get("FALLBACK_WAIT_SECS") {
            cfg.quota.fallback_wait_secs = parse_var("FALLBACK_WAIT_SECS", &v)?;
        }
        if let Some(v) = get("AUTH_THRESHOLD") {
            cfg.quota.authenticated_limit_threshold = parse_var("AUTH_THRESHOLD", &v)?;
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            cfg.cache.ttl_secs = parse_var("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("CACHE_MAX_ENTRIES") {
            cfg.cache.max_entries = Some(parse_var("CACHE_MAX_ENTRIES", &v)?);
        }
        if let Some(v) = get("MAX_QUEUE_DEPTH") {
            cfg.queue.max_queue_depth = parse_var("MAX_QUEUE_DEPTH", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(suffix: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{suffix}: {e}"))
}
