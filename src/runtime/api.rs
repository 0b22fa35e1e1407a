//! Serializable status models for health and diagnostics endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{QuotaRecord, QuotaTracker, RequestScheduler, SchedulerStats, Spawn};
use crate::util::serde::ResourceClass;

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Whether an authenticated token has been observed.
    pub authenticated: bool,
    /// Human-readable quota line.
    pub summary: String,
    /// Every known quota record, sorted by class.
    pub quotas: Vec<QuotaRecord>,
    /// Pending operations per class.
    pub queue_depths: BTreeMap<ResourceClass, usize>,
    /// Stored cache entries, including expired ones not yet read.
    pub cache_entries: usize,
    /// Throughput counters.
    pub stats: SchedulerStats,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Classes whose quota is currently exhausted.
    pub rate_limited: Vec<ResourceClass>,
}

/// Build a status snapshot of `scheduler`.
pub fn snapshot<S>(scheduler: &RequestScheduler<S>) -> StatusSnapshot
where
    S: Spawn,
{
    let tracker = scheduler.tracker();
    StatusSnapshot {
        authenticated: tracker.is_authenticated(),
        summary: tracker.format_status(),
        quotas: tracker.statuses(),
        queue_depths: scheduler.queue_depths(),
        cache_entries: scheduler.cache().len(),
        stats: scheduler.stats(),
    }
}

/// Return a health payload. Healthy while at least one tracked class has
/// quota left, or while nothing has been tracked yet.
pub fn health(tracker: &QuotaTracker) -> Health {
    let statuses = tracker.statuses();
    let rate_limited: Vec<ResourceClass> = statuses
        .iter()
        .filter(|record| record.is_exhausted())
        .map(|record| record.resource_class.clone())
        .collect();
    Health {
        ok: statuses.is_empty() || rate_limited.len() < statuses.len(),
        rate_limited,
    }
}
