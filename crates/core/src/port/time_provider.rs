// Time Provider Port (for testability)

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Time provider interface (allows deterministic clocks in tests)
///
/// Implementations must be monotonic: within the lifetime of a limiter,
/// successive calls should never go backwards. Buckets still clamp a
/// regression to zero elapsed time, so a misbehaving provider can only
/// slow refill down, never speed it up.
pub trait TimeProvider: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// System monotonic clock (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock
///
/// Starts at the instant it was created and only moves when told to.
/// Used to replay a fixed clock trace against a limiter.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tokengate_core::port::{ManualTimeProvider, TimeProvider};
///
/// let clock = ManualTimeProvider::new();
/// let t0 = clock.now();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now() - t0, Duration::from_millis(250));
/// ```
pub struct ManualTimeProvider {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    /// Move the clock backward (saturates at the origin)
    ///
    /// Only useful to exercise the regression clamp; a real monotonic
    /// source never does this.
    pub fn rewind(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset = offset.saturating_sub(by);
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
