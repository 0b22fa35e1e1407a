//! Short-lived response memo with lazy expiry.
//!
//! Entries expire only when read: there is no sweeper task. An optional
//! entry bound keeps long-running processes from growing without limit when
//! many distinct repositories are queried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::util::clock::Clock;

/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Key for a cached repository analysis.
#[must_use]
pub fn analysis_key(owner: &str, repo: &str) -> String {
    format!("analysis:{owner}/{repo}")
}

/// Key for a cached file listing under `path`.
#[must_use]
pub fn files_key(owner: &str, repo: &str, path: &str) -> String {
    format!("files:{owner}/{repo}:{path}")
}

/// A stored value and the instant it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cache key.
    pub key: String,
    /// Stored value.
    pub value: V,
    /// Write time, since the Unix epoch.
    pub inserted_at: Duration,
    /// Lifetime from `inserted_at`.
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Whether the entry reads as a miss at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.inserted_at) > self.ttl
    }
}

/// Thread-safe TTL cache keyed by opaque strings.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl<V> ResponseCache<V> {
    /// Create an unbounded cache.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: None,
            clock,
        }
    }

    /// Bound the number of live entries. Zero is ignored.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = (max_entries > 0).then_some(max_entries);
        self
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a live entry exists. Drops the entry if it has expired.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.since_epoch();
        let mut entries = self.entries.lock();
        let Some(expired) = entries.get(key).map(|entry| entry.is_expired(now)) else {
            return false;
        };
        if expired {
            entries.remove(key);
        }
        !expired
    }

    /// Store `value` under `key`, restarting its TTL window.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.since_epoch();
        let mut entries = self.entries.lock();
        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                Self::make_room(&mut entries, now);
            }
        }
        tracing::trace!(key = %key, "cache set");
        entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at: now,
                ttl: self.ttl,
            },
        );
    }

    /// Remove `key`, returning its value if it was still live.
    pub fn invalidate(&self, key: &str) -> Option<V> {
        let now = self.clock.since_epoch();
        self.entries
            .lock()
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Stored entries, including expired ones not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No entries stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Evict expired entries, or the oldest one if none have expired.
    fn make_room(entries: &mut HashMap<String, CacheEntry<V>>, now: Duration) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        if entries.len() < before {
            return;
        }
        let oldest = entries
            .values()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "cache full, evicting oldest entry");
            entries.remove(&key);
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Live value for `key`. Expired entries are dropped and read as a miss.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.since_epoch();
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.value.clone());
        }
        tracing::debug!(key, "cache entry expired");
        entries.remove(key);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;

    fn cache() -> (ResponseCache<String>, ManualClock) {
        let clock = ManualClock::at_secs(1_000);
        (
            ResponseCache::new(Duration::from_secs(300), Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache();
        cache.set("k", "v".to_string());
        clock.advance(Duration::from_secs(300));
        assert!(cache.has("k"));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_lazy_expiry_drops_entry() {
        let (cache, clock) = cache();
        cache.set("k", "v".to_string());
        clock.advance(Duration::from_secs(301));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_refreshes_window() {
        let (cache, clock) = cache();
        cache.set("k", "old".to_string());
        clock.advance(Duration::from_secs(200));
        cache.set("k", "new".to_string());
        clock.advance(Duration::from_secs(200));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn test_bounded_cache_evicts_oldest() {
        let (cache, clock) = cache();
        let cache = cache.with_max_entries(2);
        cache.set("a", "1".to_string());
        clock.advance(Duration::from_secs(1));
        cache.set("b", "2".to_string());
        clock.advance(Duration::from_secs(1));
        cache.set("a", "1b".to_string());
        cache.set("c", "3".to_string());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("1b"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn test_bounded_cache_prefers_expired() {
        let (cache, clock) = cache();
        let cache = cache.with_max_entries(2);
        cache.set("stale", "1".to_string());
        clock.advance(Duration::from_secs(250));
        cache.set("fresh", "2".to_string());
        clock.advance(Duration::from_secs(100));
        cache.set("newest", "3".to_string());
        assert!(cache.get("fresh").is_some());
        assert!(cache.get("newest").is_some());
    }

    #[test]
    fn test_invalidate_and_keys() {
        let (cache, _) = cache();
        cache.set(analysis_key("octo", "app"), "report".to_string());
        assert_eq!(
            cache.invalidate("analysis:octo/app").as_deref(),
            Some("report")
        );
        assert!(!cache.has("analysis:octo/app"));
        assert_eq!(files_key("octo", "app", "src/main"), "files:octo/app:src/main");
    }
}
