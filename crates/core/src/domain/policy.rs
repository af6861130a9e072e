// Refill Policy - rate and capacity of every bucket

use tracing::warn;

/// Token-bucket parameters shared by every bucket of a limiter
///
/// Rate (tokens/sec) and capacity (max tokens) are numerically equal:
/// N requests per second with bursts of at most N. Both are kept as
/// `f64` so refill arithmetic never truncates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefillPolicy {
    rate: f64,
    capacity: f64,
}

impl RefillPolicy {
    /// Smallest accepted rate; anything at or below zero is raised to this
    pub const MIN_RATE: i64 = 1;

    /// Largest accepted rate: every integer up to 2^53 is exact in `f64`,
    /// so subtracting one token always changes the balance
    pub const MAX_RATE: i64 = 1 << 53;

    /// Build the policy for `n` requests per second per client
    ///
    /// `n <= 0` is sanitized to 1 and `n > 2^53` to 2^53 (logged, never an
    /// error).
    pub fn per_second(n: i64) -> Self {
        let applied = n.clamp(Self::MIN_RATE, Self::MAX_RATE);
        if applied != n {
            warn!(requested = n, applied, "Invalid rate, clamping");
        }

        Self {
            rate: applied as f64,
            capacity: applied as f64,
        }
    }

    /// Tokens added per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum token balance
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
