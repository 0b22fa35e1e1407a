//! Wall-clock access for quota and cache timing.
//!
//! Quota reset instants arrive as epoch seconds from the server, so both the
//! tracker and the response cache read time through a [`Clock`] rather than
//! `Instant`. Tests swap in a [`ManualClock`] to move time without sleeping.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the Unix epoch.
    fn since_epoch(&self) -> Duration;

    /// Whole seconds since the Unix epoch.
    fn now_secs(&self) -> u64 {
        self.since_epoch().as_secs()
    }
}

/// Clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn since_epoch(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Shared handle to the process clock.
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Manually advanced clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock frozen at `start` since the epoch.
    #[must_use]
    pub fn new(start: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at `secs` seconds since the epoch.
    #[must_use]
    pub fn at_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, since_epoch: Duration) {
        *self.now.lock() = since_epoch;
    }
}

impl Clock for ManualClock {
    fn since_epoch(&self) -> Duration {
        *self.now.lock()
    }
}
