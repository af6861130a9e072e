// Token Bucket - per-client state and the refill-and-consume primitive

use super::{Decision, RefillPolicy};
use crate::port::TimeProvider;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// Cost of one request
const TOKENS_PER_REQUEST: f64 = 1.0;

/// Plain bucket state (no locking)
///
/// Invariants between operations:
/// - `0 <= tokens <= capacity`
/// - `last_refill` never moves backwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill: Instant,
}

impl BucketState {
    /// A freshly seen client starts with a full bucket
    pub fn full(policy: &RefillPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.capacity(),
            last_refill: now,
        }
    }

    /// Balance as of `now`, without touching the state
    pub fn balance_at(&self, now: Instant, policy: &RefillPolicy) -> f64 {
        // saturating: a clock regression counts as zero elapsed time
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * policy.rate()).min(policy.capacity())
    }

    /// Lazily add the tokens earned since the last refill
    pub fn refill(&mut self, now: Instant, policy: &RefillPolicy) {
        self.tokens = self.balance_at(now, policy);
        self.last_refill = self.last_refill.max(now);
    }

    /// Take one token if available
    pub fn try_consume(&mut self) -> Decision {
        if self.tokens >= TOKENS_PER_REQUEST {
            self.tokens -= TOKENS_PER_REQUEST;
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

/// Per-client token bucket
///
/// The numeric state is guarded by the bucket's own lock, independent of
/// the limiter-wide lock over the client map.
#[derive(Debug)]
pub struct Bucket {
    policy: RefillPolicy,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(policy: RefillPolicy, now: Instant) -> Self {
        Self {
            policy,
            state: Mutex::new(BucketState::full(&policy, now)),
        }
    }

    /// Refill by elapsed time, then try to take one token
    ///
    /// The clock is read while the lock is held, so successive holders
    /// observe non-decreasing instants.
    pub fn refill_and_consume(&self, clock: &dyn TimeProvider) -> Decision {
        let mut state = self.lock();
        state.refill(clock.now(), &self.policy);
        state.try_consume()
    }

    /// Current balance including pending refill (read-only)
    pub fn available(&self, clock: &dyn TimeProvider) -> f64 {
        let state = self.lock();
        state.balance_at(clock.now(), &self.policy)
    }

    /// Copy of the raw state
    pub fn snapshot(&self) -> BucketState {
        *self.lock()
    }

    /// Whether the bucket has been untouched for `max_idle` and is full again
    ///
    /// Returns `None` when another caller currently holds the lock.
    pub fn try_is_idle(&self, now: Instant, max_idle: Duration) -> Option<bool> {
        let state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        let idle_for = now.saturating_duration_since(state.last_refill);
        let full = state.balance_at(now, &self.policy) >= self.policy.capacity();
        Some(idle_for >= max_idle && full)
    }

    // Critical sections only do total arithmetic, so a poisoned lock still
    // guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ManualTimeProvider;

    fn bucket(n: i64, clock: &ManualTimeProvider) -> Bucket {
        Bucket::new(RefillPolicy::per_second(n), clock.now())
    }

    fn drain(bucket: &Bucket, clock: &ManualTimeProvider) -> usize {
        let mut allowed = 0;
        while bucket.refill_and_consume(clock).is_allowed() {
            allowed += 1;
        }
        allowed
    }

    #[test]
    fn test_new_bucket_is_full() {
        let clock = ManualTimeProvider::new();
        let b = bucket(4, &clock);
        assert_eq!(b.snapshot().tokens, 4.0);
        assert_eq!(drain(&b, &clock), 4);
    }

    #[test]
    fn test_refill_is_proportional_to_elapsed_time() {
        let clock = ManualTimeProvider::new();
        let b = bucket(5, &clock);
        assert_eq!(drain(&b, &clock), 5);

        // 2/5 s -> two tokens
        clock.advance(Duration::from_millis(400));
        assert_eq!(drain(&b, &clock), 2);

        // >= C/R -> full burst again
        clock.advance(Duration::from_secs(1));
        assert_eq!(drain(&b, &clock), 5);
    }

    #[test]
    fn test_balance_never_exceeds_capacity() {
        let clock = ManualTimeProvider::new();
        let b = bucket(3, &clock);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(b.available(&clock), 3.0);
        assert!(b.refill_and_consume(&clock).is_allowed());
        assert_eq!(b.snapshot().tokens, 2.0);
    }

    #[test]
    fn test_fractional_tokens_survive_denials() {
        let clock = ManualTimeProvider::new();
        let b = bucket(1, &clock);
        assert!(b.refill_and_consume(&clock).is_allowed());

        // Four denials at 250ms cadence accumulate a whole token
        for _ in 0..3 {
            clock.advance(Duration::from_millis(250));
            assert!(b.refill_and_consume(&clock).is_denied());
        }
        clock.advance(Duration::from_millis(250));
        assert!(b.refill_and_consume(&clock).is_allowed());
    }

    #[test]
    fn test_clock_regression_counts_as_zero_elapsed() {
        let clock = ManualTimeProvider::new();
        clock.advance(Duration::from_secs(10));
        let b = bucket(2, &clock);
        assert_eq!(drain(&b, &clock), 2);
        let before = b.snapshot();

        clock.rewind(Duration::from_secs(5));
        assert!(b.refill_and_consume(&clock).is_denied());

        let after = b.snapshot();
        assert_eq!(after.tokens, 0.0);
        // last_refill does not move backwards
        assert_eq!(after.last_refill, before.last_refill);

        // Back at the pre-regression instant: nothing was earned meanwhile
        clock.advance(Duration::from_secs(5));
        assert!(b.refill_and_consume(&clock).is_denied());
    }

    #[test]
    fn test_last_refill_updated_on_deny() {
        let clock = ManualTimeProvider::new();
        let b = bucket(1, &clock);
        assert!(b.refill_and_consume(&clock).is_allowed());

        clock.advance(Duration::from_millis(300));
        assert!(b.refill_and_consume(&clock).is_denied());
        assert_eq!(b.snapshot().last_refill, clock.now());
        assert!((b.snapshot().tokens - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_zero_elapsed_second_call_denied_below_two_tokens() {
        let clock = ManualTimeProvider::new();
        let b = bucket(3, &clock);
        assert_eq!(drain(&b, &clock), 3);
        clock.advance(Duration::from_millis(500)); // 1.5 tokens

        assert!(b.refill_and_consume(&clock).is_allowed());
        assert!(b.refill_and_consume(&clock).is_denied());
    }

    #[test]
    fn test_huge_rate_still_drains() {
        let clock = ManualTimeProvider::new();
        let b = bucket(i64::MAX, &clock);
        let full = b.snapshot().tokens;

        assert!(b.refill_and_consume(&clock).is_allowed());
        assert_eq!(b.snapshot().tokens, full - 1.0);
        assert!(b.snapshot().tokens < full);
    }

    #[test]
    fn test_try_is_idle() {
        let clock = ManualTimeProvider::new();
        let b = bucket(2, &clock);
        assert_eq!(b.try_is_idle(clock.now(), Duration::from_secs(1)), Some(false));

        assert!(b.refill_and_consume(&clock).is_allowed());
        clock.advance(Duration::from_secs(1));
        // Idle long enough and refilled to capacity
        assert_eq!(b.try_is_idle(clock.now(), Duration::from_secs(1)), Some(true));

        let _held = b.lock();
        assert_eq!(b.try_is_idle(clock.now(), Duration::from_secs(1)), None);
    }

    #[test]
    fn test_drained_bucket_is_not_idle_until_full() {
        let clock = ManualTimeProvider::new();
        let b = bucket(10, &clock);
        assert_eq!(drain(&b, &clock), 10);

        // 0.5 s idle but only half refilled
        clock.advance(Duration::from_millis(500));
        assert_eq!(b.try_is_idle(clock.now(), Duration::from_millis(100)), Some(false));
    }
}
