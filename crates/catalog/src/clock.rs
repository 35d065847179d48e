//! Time source and the request gate built on top of it.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shortest permitted gap between the starts of two consecutive catalog requests.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Source of monotonic time that can also block.
///
/// Injected so that tests can observe rate limiting without actually waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub type ClockHandle = Arc<dyn Clock>;

/// The real thing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Process-wide gate in front of the catalog.
///
/// [`RateLimiter::wait`] blocks until at least the configured interval has
/// passed since the previous request started, then records the new start
/// time. The lock is held while sleeping so concurrent callers queue up
/// instead of all waking at the same instant.
pub struct RateLimiter {
    clock: ClockHandle,
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(clock: ClockHandle) -> Self {
        Self::with_interval(clock, MIN_INTERVAL)
    }

    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn with_interval(clock: ClockHandle, interval: Duration) -> Self {
        Self {
            clock,
            interval: interval.max(MIN_INTERVAL),
            last_request: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn wait(&self) {
        // A poisoned lock only means another thread panicked mid-wait; the
        // timestamp inside is still meaningful.
        let mut last_request = self.last_request.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last_request {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.interval {
                let remaining = self.interval - elapsed;
                tracing::trace!(?remaining, "Waiting for rate limiter");
                self.clock.sleep(remaining);
            }
        }
        *last_request = Some(self.clock.now());
    }
}
