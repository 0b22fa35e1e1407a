//! Per-resource-class quota bookkeeping.
//!
//! The tracker only records what the server reports and answers how long a
//! caller should wait before the next request. It never sleeps and never
//! decrements `remaining` on its own: capacity is consumed on the server.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::RateLimitInfo;
use crate::util::clock::Clock;
use crate::util::serde::ResourceClass;

/// Wait used when a class is exhausted but its reset instant is unknown.
pub const DEFAULT_FALLBACK_WAIT: Duration = Duration::from_secs(3600);
/// Core limit at or above which the token is considered authenticated.
pub const DEFAULT_AUTHENTICATED_THRESHOLD: u64 = 5000;

/// Snapshot of the capacity for one resource class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Resource class this record describes.
    pub resource_class: ResourceClass,
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Server-declared replenish instant, epoch seconds.
    pub reset_at: Option<u64>,
}

impl QuotaRecord {
    /// Build a record.
    pub fn new(
        resource_class: impl Into<ResourceClass>,
        limit: u64,
        remaining: u64,
        reset_at: Option<u64>,
    ) -> Self {
        Self {
            resource_class: resource_class.into(),
            limit,
            remaining,
            reset_at,
        }
    }

    /// No requests left in the window.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Default)]
struct QuotaState {
    records: HashMap<ResourceClass, QuotaRecord>,
    authenticated: bool,
}

/// Thread-safe quota tracker shared by every scheduler lane.
#[derive(Debug)]
pub struct QuotaTracker {
    state: Mutex<QuotaState>,
    clock: Arc<dyn Clock>,
    fallback_wait: Duration,
    authenticated_threshold: u64,
}

impl QuotaTracker {
    /// Create an empty tracker reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QuotaState::default()),
            clock,
            fallback_wait: DEFAULT_FALLBACK_WAIT,
            authenticated_threshold: DEFAULT_AUTHENTICATED_THRESHOLD,
        }
    }

    /// Override the wait used when the reset instant is unknown.
    #[must_use]
    pub fn with_fallback_wait(mut self, wait: Duration) -> Self {
        self.fallback_wait = wait;
        self
    }

    /// Override the core limit that marks the token as authenticated.
    #[must_use]
    pub fn with_authenticated_threshold(mut self, threshold: u64) -> Self {
        self.authenticated_threshold = threshold;
        self
    }

    /// Install an initial record without touching the authentication flag.
    #[must_use]
    pub fn with_seed(self, record: QuotaRecord) -> Self {
        self.state
            .lock()
            .records
            .insert(record.resource_class.clone(), record);
        self
    }

    /// Wait used when the reset instant is unknown.
    #[must_use]
    pub const fn fallback_wait(&self) -> Duration {
        self.fallback_wait
    }

    /// Overwrite the record for `resource_class` with observed values.
    pub fn record_usage(
        &self,
        resource_class: impl Into<ResourceClass>,
        limit: u64,
        remaining: u64,
        reset_at: Option<u64>,
    ) {
        let record = QuotaRecord::new(resource_class, limit, remaining, reset_at);
        let mut state = self.state.lock();
        if record.resource_class.is_core()
            && limit >= self.authenticated_threshold
            && !state.authenticated
        {
            state.authenticated = true;
            tracing::info!(limit, "authenticated token detected");
        }
        tracing::debug!(
            resource_class = %record.resource_class,
            remaining,
            limit,
            reset_at,
            "quota updated"
        );
        state
            .records
            .insert(record.resource_class.clone(), record);
    }

    /// Merge partially populated metadata into the current record.
    ///
    /// Fields missing from `info` keep their previous value (zero when the
    /// class has never been seen). Empty metadata is ignored.
    pub fn record_from(&self, resource_class: &ResourceClass, info: &RateLimitInfo) {
        if info.is_empty() {
            return;
        }
        let previous = self.own_record(resource_class.as_str());
        let limit = info
            .limit
            .or_else(|| previous.as_ref().map(|r| r.limit))
            .unwrap_or_default();
        let remaining = info
            .remaining
            .or_else(|| previous.as_ref().map(|r| r.remaining))
            .unwrap_or_default();
        let reset_at = info.reset_at.or_else(|| previous.and_then(|r| r.reset_at));
        self.record_usage(resource_class, limit, remaining, reset_at);
    }

    /// Copy of the record governing `resource_class`.
    ///
    /// A class never observed is governed by the `core` record, so the
    /// returned record may name `core` rather than the requested class.
    #[must_use]
    pub fn status(&self, resource_class: &str) -> Option<QuotaRecord> {
        let state = self.state.lock();
        state
            .records
            .get(resource_class)
            .or_else(|| state.records.get(ResourceClass::CORE))
            .cloned()
    }

    /// Whether `resource_class` has a record of its own.
    #[must_use]
    pub fn has_record(&self, resource_class: &str) -> bool {
        self.state.lock().records.contains_key(resource_class)
    }

    fn own_record(&self, resource_class: &str) -> Option<QuotaRecord> {
        self.state.lock().records.get(resource_class).cloned()
    }

    /// Copies of every record, ordered by class name.
    #[must_use]
    pub fn statuses(&self) -> Vec<QuotaRecord> {
        let mut records: Vec<_> = self.state.lock().records.values().cloned().collect();
        records.sort_by(|a, b| a.resource_class.cmp(&b.resource_class));
        records
    }

    /// How long to wait before the next request on `resource_class`.
    ///
    /// Zero while requests remain, or when neither the class nor `core` has
    /// been observed.
    #[must_use]
    pub fn wait_time(&self, resource_class: &str) -> Duration {
        let Some(record) = self.status(resource_class) else {
            return Duration::ZERO;
        };
        if record.remaining > 0 {
            return Duration::ZERO;
        }
        record.reset_at.map_or(self.fallback_wait, |reset_at| {
            Duration::from_secs(reset_at).saturating_sub(self.clock.since_epoch())
        })
    }

    /// `remaining` is zero in the record governing `resource_class`.
    #[must_use]
    pub fn is_exhausted(&self, resource_class: &str) -> bool {
        self.status(resource_class)
            .is_some_and(|record| record.is_exhausted())
    }

    /// A core limit at or above the threshold has been observed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().authenticated
    }

    /// One-line summary such as `CORE: 4999/5000 (reset: 12:00:00 UTC)`.
    ///
    /// Classes with a zero limit are omitted.
    #[must_use]
    pub fn format_status(&self) -> String {
        let mut out = String::new();
        for record in self.statuses().iter().filter(|r| r.limit > 0) {
            if !out.is_empty() {
                out.push_str(" | ");
            }
            let _ = write!(
                out,
                "{}: {}/{} (reset: {})",
                record.resource_class.as_str().to_uppercase(),
                record.remaining,
                record.limit,
                record
                    .reset_at
                    .map_or_else(|| "N/A".to_string(), format_utc_time)
            );
        }
        if out.is_empty() {
            out.push_str("No rate limit data");
        }
        out
    }
}

fn format_utc_time(epoch_secs: u64) -> String {
    let secs_of_day = epoch_secs % 86_400;
    format!(
        "{:02}:{:02}:{:02} UTC",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}
