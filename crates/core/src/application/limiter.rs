// Limiter - client map and admission dispatch
use crate::application::LimiterConfig;
use crate::domain::{Bucket, Decision, RefillPolicy};
use crate::port::{SystemTimeProvider, TimeProvider};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Per-client token-bucket admission controller
///
/// Locking discipline:
/// - The limiter lock guards only the client map (lookup and creation).
/// - Each bucket's lock guards that bucket's tokens and refill instant.
/// - The limiter lock is always taken first and released before any
///   bucket lock is taken, so no path can deadlock and distinct clients
///   never serialize on each other's arithmetic.
///
/// Buckets are created lazily on first sight (full) and are never
/// replaced; only [`Limiter::prune_idle`] removes them, and only when
/// explicitly called.
///
/// # Example
/// ```
/// use tokengate_core::Limiter;
///
/// let limiter = Limiter::new(3);
/// assert!(limiter.check("clientA"));
/// assert!(limiter.check("clientA"));
/// assert!(limiter.check("clientA"));
/// assert!(!limiter.check("clientA"));
/// assert!(limiter.check("clientB"));
/// ```
pub struct Limiter<K = String> {
    policy: RefillPolicy,
    clients: Mutex<HashMap<K, Arc<Bucket>>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Limiter {
    /// Limiter allowing `n` requests per second (and bursts of `n`) per client
    ///
    /// `n <= 0` is sanitized to 1.
    pub fn new(n: i64) -> Self {
        Self::with_time_provider(n, Arc::new(SystemTimeProvider))
    }

    /// Same as [`Limiter::new`] with an explicit clock
    pub fn with_time_provider(n: i64, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_policy(RefillPolicy::per_second(n), time_provider)
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::with_policy(config.policy(), Arc::new(SystemTimeProvider))
    }
}

impl<K> Limiter<K>
where
    K: Eq + Hash,
{
    /// Limiter over an arbitrary client key type
    pub fn with_policy(policy: RefillPolicy, time_provider: Arc<dyn TimeProvider>) -> Self {
        debug!(
            rate = policy.rate(),
            capacity = policy.capacity(),
            "Limiter created"
        );

        Self {
            policy,
            clients: Mutex::new(HashMap::new()),
            time_provider,
        }
    }

    /// Decide whether `client` may perform one request right now
    ///
    /// Never blocks beyond the two short critical sections and never
    /// fails; a denial is a normal outcome.
    pub fn decide<Q>(&self, client: &Q) -> Decision
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        // Limiter lock is released inside bucket_for
        let bucket = self.bucket_for(client);
        let decision = bucket.refill_and_consume(self.time_provider.as_ref());

        trace!(decision = %decision, "Admission decided");
        decision
    }

    /// Boolean form of [`Limiter::decide`]
    pub fn check<Q>(&self, client: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.decide(client).is_allowed()
    }

    /// Tokens `client` could spend right now, without spending any
    ///
    /// Returns `None` for a client that has never been seen; does not
    /// create a bucket.
    pub fn available_tokens<Q>(&self, client: &Q) -> Option<f64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.lock_clients().get(client).map(Arc::clone)?;
        Some(bucket.available(self.time_provider.as_ref()))
    }

    pub fn contains<Q>(&self, client: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock_clients().contains_key(client)
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.lock_clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_clients().is_empty()
    }

    pub fn policy(&self) -> RefillPolicy {
        self.policy
    }

    /// Drop buckets idle for at least `max_idle` that have refilled to capacity
    ///
    /// Only runs when the embedder calls it. A pruned client comes back
    /// with a full bucket, which is exactly what it would have had, so
    /// pruning never changes a verdict. Buckets whose lock is held, or
    /// whose handle is still owned by an in-flight `decide`, are skipped.
    ///
    /// Returns the number of buckets removed. `max_idle == 0` is a no-op.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        if max_idle.is_zero() {
            return 0;
        }

        let mut clients = self.lock_clients();
        let now = self.time_provider.now();
        let before = clients.len();

        clients.retain(|_, bucket| {
            // New handles are only cloned under the limiter lock we hold
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            bucket.try_is_idle(now, max_idle) != Some(true)
        });

        let removed = before - clients.len();
        debug!(
            removed,
            remaining = clients.len(),
            max_idle_ms = max_idle.as_millis() as u64,
            "Pruned idle buckets"
        );
        removed
    }

    /// Resolve (or create) the bucket for `client`
    ///
    /// The returned handle stays valid after the limiter lock is released.
    fn bucket_for<Q>(&self, client: &Q) -> Arc<Bucket>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let mut clients = self.lock_clients();

        if let Some(bucket) = clients.get(client) {
            return Arc::clone(bucket);
        }

        let bucket = Arc::new(Bucket::new(self.policy, self.time_provider.now()));
        clients.insert(client.to_owned(), Arc::clone(&bucket));

        debug!(
            tracked_clients = clients.len(),
            tokens = self.policy.capacity(),
            "New client bucket"
        );
        bucket
    }

    // The map is only touched by insert/get/retain, none of which leave it
    // half-updated on panic.
    fn lock_clients(&self) -> MutexGuard<'_, HashMap<K, Arc<Bucket>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K> std::fmt::Debug for Limiter<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("policy", &self.policy)
            .field("clients", &self.len())
            .finish()
    }
}
