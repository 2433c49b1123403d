use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::CacheStore;
use crate::types::Result;

/// A unit of external work taking one structured argument.
///
/// The research loop consumes its evidence and generation capabilities
/// through this shape so that any of them can be wrapped by [`Cached`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// Argument; its serialized form is the cache key
    type Input: Serialize + Send + Sync;
    /// Result; stored serialized
    type Output: Serialize + DeserializeOwned + Send;

    /// Run the capability once
    async fn invoke(&self, input: &Self::Input) -> Result<Self::Output>;
}

#[async_trait]
impl<C: Capability + ?Sized> Capability for Arc<C> {
    type Input = C::Input;
    type Output = C::Output;

    async fn invoke(&self, input: &Self::Input) -> Result<Self::Output> {
        (**self).invoke(input).await
    }
}

/// Hit/miss counters for a [`Cached`] capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Calls answered from the store
    pub hits: u64,
    /// Calls that invoked the wrapped capability
    pub misses: u64,
    /// Store reads or writes that failed and were bypassed
    pub store_errors: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Per-key lock and the number of calls currently registered on it
struct Gate {
    lock: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

type InFlight = Mutex<HashMap<String, Gate>>;

/// A call's registration on a key's gate.
///
/// Dropping it unregisters the call and removes the gate once no call is left,
/// including when the call is cancelled while waiting or computing.
struct GateTicket<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> GateTicket<'a> {
    fn join(in_flight: &'a InFlight, key: &'a str) -> Self {
        let mut gates = in_flight.lock();
        let gate = gates.entry(key.to_string()).or_insert_with(|| Gate {
            lock: Arc::new(tokio::sync::Mutex::new(())),
            users: 0,
        });
        gate.users += 1;

        Self {
            in_flight,
            key,
            lock: Arc::clone(&gate.lock),
        }
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        let mut gates = self.in_flight.lock();
        let idle = match gates.get_mut(self.key) {
            Some(gate) => {
                gate.users = gate.users.saturating_sub(1);
                gate.users == 0
            }
            None => false,
        };
        if idle {
            gates.remove(self.key);
        }
    }
}

/// Memoizing decorator around a [`Capability`].
///
/// On a hit the stored value is returned without invoking the wrapped
/// capability. On a miss the capability runs and its result is written back.
/// Entries never expire unless the store itself expires them.
///
/// Without single-flight, two concurrent misses on the same key both invoke
/// the capability and both write (last write wins). With
/// [`Cached::with_single_flight`], the first caller computes and concurrent
/// callers for the same key wait and then read its result from the store.
///
/// A failing store never fails the call: reads degrade to misses and write
/// failures are logged.
pub struct Cached<C> {
    name: String,
    inner: C,
    store: Arc<dyn CacheStore>,
    in_flight: Option<InFlight>,
    hits: AtomicU64,
    misses: AtomicU64,
    store_errors: AtomicU64,
}

impl<C: Capability> Cached<C> {
    /// Memoize `inner` in `store` under `name`
    pub fn wrap(name: impl Into<String>, inner: C, store: Arc<dyn CacheStore>) -> Self {
        Self {
            name: name.into(),
            inner,
            store,
            in_flight: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
        }
    }

    /// Deduplicate concurrent misses on the same key
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(Mutex::new(HashMap::new()));
        self
    }

    /// Name mixed into every key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped capability
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Hit, miss and store error counts so far
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }

    /// Compute the store key for `input`
    pub fn cache_key(&self, input: &C::Input) -> Result<String> {
        // Round-trip through Value so map keys come out in a stable order
        let canonical = serde_json::to_string(&serde_json::to_value(input)?)?;

        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    async fn lookup(&self, key: &str) -> Option<C::Output> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(cache = %self.name, error = %e, "Cache read failed, bypassing store");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn compute(&self, key: &str, input: &C::Input) -> Result<C::Output> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache = %self.name, key = %key, "Cache miss");

        let output = self.inner.invoke(input).await?;

        match serde_json::to_string(&output) {
            Ok(raw) => {
                if let Err(e) = self.store.set(key, raw).await {
                    self.store_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(cache = %self.name, error = %e, "Cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Result is not cacheable");
            }
        }

        Ok(output)
    }

    fn hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache = %self.name, key = %key, "Cache hit");
    }
}

#[async_trait]
impl<C: Capability> Capability for Cached<C> {
    type Input = C::Input;
    type Output = C::Output;

    async fn invoke(&self, input: &Self::Input) -> Result<Self::Output> {
        let key = match self.cache_key(input) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Argument is not serializable, calling through");
                return self.inner.invoke(input).await;
            }
        };

        if let Some(value) = self.lookup(&key).await {
            self.hit(&key);
            return Ok(value);
        }

        let Some(in_flight) = &self.in_flight else {
            return self.compute(&key, input).await;
        };

        let ticket = GateTicket::join(in_flight, &key);
        let _held = ticket.lock.lock().await;

        // The call that held the gate before us has usually filled the store
        let result = match self.lookup(&key).await {
            Some(value) => {
                self.hit(&key);
                Ok(value)
            }
            None => self.compute(&key, input).await,
        };

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCacheStore;
    use crate::types::AppError;
    use std::sync::atomic::AtomicUsize;

    struct Doubler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Capability for Doubler {
        type Input = u64;
        type Output = u64;

        async fn invoke(&self, input: &u64) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input * 2)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::Cache("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: String) -> Result<()> {
            Err(AppError::Cache("connection refused".to_string()))
        }
    }

    fn doubler() -> Doubler {
        Doubler {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_cache_key_depends_on_name_and_argument() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::with_defaults());
        let a = Cached::wrap("double", doubler(), store.clone());
        let b = Cached::wrap("triple", doubler(), store);

        assert_eq!(a.cache_key(&1).unwrap(), a.cache_key(&1).unwrap());
        assert_ne!(a.cache_key(&1).unwrap(), a.cache_key(&2).unwrap());
        assert_ne!(a.cache_key(&1).unwrap(), b.cache_key(&1).unwrap());
        assert_eq!(a.cache_key(&1).unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_second_call_is_a_hit() {
        let cached = Cached::wrap("double", doubler(), Arc::new(MemoryCacheStore::with_defaults()));

        assert_eq!(cached.invoke(&21).await.unwrap(), 42);
        assert_eq!(cached.invoke(&21).await.unwrap(), 42);

        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_broken_store_passes_through() {
        let cached = Cached::wrap("double", doubler(), Arc::new(BrokenStore));

        assert_eq!(cached.invoke(&5).await.unwrap(), 10);
        assert_eq!(cached.invoke(&5).await.unwrap(), 10);

        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.stats().store_errors, 4);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_recomputed() {
        let store = Arc::new(MemoryCacheStore::with_defaults());
        let cached = Cached::wrap("double", doubler(), store.clone());

        let key = cached.cache_key(&3).unwrap();
        store.set(&key, "not json".to_string()).await.unwrap();

        assert_eq!(cached.invoke(&3).await.unwrap(), 6);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(&key).await.unwrap(), Some("6".to_string()));
    }

    struct Stalled;

    #[async_trait]
    impl Capability for Stalled {
        type Input = u64;
        type Output = u64;

        async fn invoke(&self, input: &u64) -> Result<u64> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(*input)
        }
    }

    fn gates<C>(cached: &Cached<C>) -> usize {
        cached.in_flight.as_ref().map_or(0, |gates| gates.lock().len())
    }

    #[tokio::test]
    async fn test_cancelled_calls_release_their_gates() {
        let cached = Arc::new(
            Cached::wrap("stalled", Stalled, Arc::new(MemoryCacheStore::with_defaults()))
                .with_single_flight(),
        );

        for i in 0..50u64 {
            let outcome =
                tokio::time::timeout(std::time::Duration::from_millis(1), cached.invoke(&(i % 5)))
                    .await;
            assert!(outcome.is_err());
        }
        assert_eq!(gates(&cached), 0);

        // Concurrent waiters on one key, all cancelled together
        let calls: Vec<_> = (0..10)
            .map(|_| {
                let cached = Arc::clone(&cached);
                tokio::spawn(async move { cached.invoke(&7).await })
            })
            .collect();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(gates(&cached), 1);

        for call in calls {
            call.abort();
            assert!(call.await.unwrap_err().is_cancelled());
        }
        assert_eq!(gates(&cached), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completed_calls_release_their_gates() {
        let cached = Arc::new(
            Cached::wrap("double", doubler(), Arc::new(MemoryCacheStore::with_defaults()))
                .with_single_flight(),
        );

        let calls: Vec<_> = (0..200u64)
            .map(|i| {
                let cached = Arc::clone(&cached);
                tokio::spawn(async move { cached.invoke(&(i % 4)).await })
            })
            .collect();
        for call in calls {
            assert_eq!(call.await.unwrap().unwrap() % 2, 0);
        }

        assert_eq!(gates(&cached), 0);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_hit_rate_with_no_traffic() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
