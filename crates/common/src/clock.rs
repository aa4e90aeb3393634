//! Time abstraction for testability
//!
//! Cache entries are stamped with wall-clock milliseconds so they stay
//! comparable across process restarts. Production code uses [`SystemClock`];
//! tests drive a [`MockClock`] by hand.
//!
//! ```
//! use std::time::Duration;
//!
//! use tether_common::{Clock, MockClock};
//!
//! let clock = MockClock::at(0);
//! clock.advance(Duration::from_secs(3));
//! assert_eq!(clock.now_millis(), 3_000);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in milliseconds since the UNIX epoch.
pub trait Clock: Send + Sync + 'static {
    /// Current time in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> u64;
}

/// Shared, type-erased clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying time, so a test can hand one clone to the
/// component under test and keep another to advance.
#[derive(Debug, Clone)]
pub struct MockClock {
    millis: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock starting at the current system time.
    pub fn new() -> Self {
        Self::at(SystemClock.now_millis())
    }

    /// Create a mock clock frozen at `millis` since the epoch.
    pub fn at(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.millis.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Advance the clock by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
