use dashmap::{DashMap, DashSet};
use jiff::{SignedDuration, Timestamp};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use terra_core::{Clock, Environment, FetchError, FetchKey, SystemClock};
use tracing::{debug, error, trace, warn};
use typed_builder::TypedBuilder;

/// Type alias for cache results.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Entries older than this are refreshed unless the caller says otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Configuration for a [`KeyedAsyncCache`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold. Unbounded when unset.
    #[builder(default, setter(strip_option))]
    max_capacity: Option<u64>,
    /// TTL applied when a resolve call does not bring its own.
    #[builder(default = DEFAULT_TTL)]
    default_ttl: Duration,
    /// When disabled every resolve runs its producer.
    #[builder(default = true)]
    enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Per-call options for [`KeyedAsyncCache::resolve`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolveOptions {
    #[builder(default, setter(strip_option))]
    pub ttl: Option<Duration>,
    /// Record results for transfer on the server and adopt them on the client.
    #[builder(default = true)]
    pub use_server_transfer: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone)]
struct CacheEntry {
    payload: Arc<dyn Any + Send + Sync>,
    stored_at: Timestamp,
}

impl CacheEntry {
    fn new<V: Send + Sync + 'static>(value: V, stored_at: Timestamp) -> Self {
        Self {
            payload: Arc::new(value),
            stored_at,
        }
    }

    fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        let ttl = SignedDuration::try_from(ttl).unwrap_or(SignedDuration::MAX);
        now.duration_since(self.stored_at) < ttl
    }

    fn value<V: Clone + 'static>(&self, key: &FetchKey) -> Result<V> {
        self.payload.downcast_ref::<V>().cloned().ok_or_else(|| {
            error!(key = %key, "cache entry holds a payload of another type");
            FetchError::InvalidKey(format!(
                "key '{key}' already holds a value of another type"
            ))
        })
    }
}

/// A keyed fetch-with-cache primitive with single-flight and hydration.
///
/// # Resolution order
///
/// 1. A fresh in-memory entry for the key.
/// 2. On the client, a value transferred by the server render (first access
///    to the key only).
/// 3. The caller's producer. Concurrent callers for the same key share one
///    producer invocation; different keys proceed independently.
///
/// Entries older than the caller's TTL are treated as absent and evicted on
/// that access. There is no background sweep.
///
/// Failures are recorded in a per-key error slot and are never retried by the
/// cache itself.
#[derive(Clone)]
pub struct KeyedAsyncCache {
    entries: Cache<FetchKey, CacheEntry>,
    errors: Arc<DashMap<FetchKey, FetchError>>,
    // keys whose current entry came from the transfer payload
    hydrated: Arc<DashSet<FetchKey>>,
    // keys whose transfer value has been consumed
    adopted: Arc<DashSet<FetchKey>>,
    environment: Arc<dyn Environment>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl KeyedAsyncCache {
    /// Creates a cache with default settings.
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self::with_config(environment, CacheConfig::default())
    }

    pub fn with_config(environment: Arc<dyn Environment>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            entries: builder.build(),
            errors: Arc::new(DashMap::new()),
            hydrated: Arc::new(DashSet::new()),
            adopted: Arc::new(DashSet::new()),
            environment,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the clock used for TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Resolves `key`, running `produce` only if no usable value exists.
    pub async fn resolve<V, F, Fut>(
        &self,
        key: &FetchKey,
        produce: F,
        options: &ResolveOptions,
    ) -> Result<V>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V>> + Send,
    {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        if !self.config.enabled || ttl.is_zero() {
            trace!(key = %key, "caching disabled, producing a fresh value");
            let result = produce().await;
            return self.settle(key, result, options, true);
        }

        if let Some(entry) = self.entries.get(key).await {
            if entry.is_fresh(self.clock.now(), ttl) {
                debug!(key = %key, "cache hit");
                return entry.value(key);
            }
            debug!(key = %key, "cache entry expired, evicting");
            self.entries.invalidate(key).await;
            self.hydrated.remove(key);
        }

        if options.use_server_transfer {
            if let Some(value) = self.adopt_transfer::<V>(key).await {
                return Ok(value);
            }
        }

        trace!(key = %key, "cache miss, performing single-flight fetch");
        let clock = Arc::clone(&self.clock);
        let mut produced = false;
        let ran_produce = &mut produced;
        // try_get_with coalesces concurrent initializations of the same key
        let result = self
            .entries
            .try_get_with(key.clone(), async move {
                *ran_produce = true;
                let value = produce().await?;
                Ok::<_, FetchError>(CacheEntry::new(value, clock.now()))
            })
            .await
            .map_err(|e| e.as_ref().clone())
            .and_then(|entry| entry.value::<V>(key));

        self.settle(key, result, options, produced)
    }

    /// Returns the error left by the last failed resolution of `key`.
    pub fn last_error(&self, key: &FetchKey) -> Option<FetchError> {
        self.errors.get(key).map(|e| e.value().clone())
    }

    /// Whether the current entry for `key` was adopted from the transfer payload.
    pub fn is_hydrated(&self, key: &FetchKey) -> bool {
        self.hydrated.contains(key)
    }

    /// Approximate number of stored entries, including expired ones not yet
    /// evicted.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Drops the entry for `key` so the next resolve refetches.
    pub async fn invalidate(&self, key: &FetchKey) {
        trace!(key = %key, "invalidating cache entry");
        self.entries.invalidate(key).await;
        self.hydrated.remove(key);
    }

    async fn adopt_transfer<V>(&self, key: &FetchKey) -> Option<V>
    where
        V: Clone + DeserializeOwned + Send + Sync + 'static,
    {
        if self.environment.is_server_side() || self.adopted.contains(key) {
            return None;
        }

        let raw = self.environment.read_transfer(key)?;
        self.adopted.insert(key.clone());

        match serde_json::from_str::<V>(&raw) {
            Ok(value) => {
                self.entries
                    .insert(key.clone(), CacheEntry::new(value.clone(), self.clock.now()))
                    .await;
                self.hydrated.insert(key.clone());
                self.errors.remove(key);
                debug!(key = %key, "hydrated from transfer payload");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable transfer value");
                None
            }
        }
    }

    fn settle<V: Serialize>(
        &self,
        key: &FetchKey,
        result: Result<V>,
        options: &ResolveOptions,
        produced: bool,
    ) -> Result<V> {
        match result {
            Ok(value) => {
                self.errors.remove(key);
                // a coalesced caller may be sharing an entry adopted from the transfer
                if produced {
                    self.hydrated.remove(key);
                }
                if options.use_server_transfer && self.environment.is_server_side() {
                    self.record_transfer(key, &value);
                }
                Ok(value)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "fetch failed");
                self.errors.insert(key.clone(), err.clone());
                Err(err)
            }
        }
    }

    fn record_transfer<V: Serialize>(&self, key: &FetchKey, value: &V) {
        match serde_json::to_string(value) {
            Ok(payload) => self.environment.write_transfer(key, payload),
            Err(e) => warn!(key = %key, error = %e, "failed to serialize value for transfer"),
        }
    }
}

impl Debug for KeyedAsyncCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedAsyncCache")
            .field("side", &self.environment.side())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientEnvironment, ServerEnvironment, TransferPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use terra_core::{ManualClock, NetworkError};

    fn key(s: &str) -> FetchKey {
        FetchKey::new(s).unwrap()
    }

    fn client_cache() -> KeyedAsyncCache {
        KeyedAsyncCache::new(Arc::new(ClientEnvironment::empty()))
    }

    type BoxedFetch = std::pin::Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send>>;

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: Vec<String>,
    ) -> impl FnOnce() -> BoxedFetch + Send {
        let calls = Arc::clone(calls);
        move || -> BoxedFetch {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        }
    }

    #[tokio::test]
    async fn resolve_caches_value() {
        let cache = client_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();

        let first = cache
            .resolve(&key("countries-all"), counting(&calls, vec!["DEU".into()]), &opts)
            .await
            .unwrap();
        let second = cache
            .resolve(&key("countries-all"), counting(&calls, vec!["FRA".into()]), &opts)
            .await
            .unwrap();

        assert_eq!(first, vec!["DEU".to_string()]);
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_share_one_producer() {
        let cache = client_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .resolve(
                        &key("countries-all"),
                        || async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(vec!["DEU".to_string()])
                        },
                        &ResolveOptions::default(),
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec!["DEU".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_resolve_independently() {
        let cache = client_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();

        let europe = key("countries-europe");
        let asia = key("countries-asia");
        let (a, b) = tokio::join!(
            cache.resolve(&europe, counting(&calls, vec!["DEU".into()]), &opts),
            cache.resolve(&asia, counting(&calls, vec!["JPN".into()]), &opts),
        );

        assert_eq!(a.unwrap(), vec!["DEU".to_string()]);
        assert_eq!(b.unwrap(), vec!["JPN".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed() {
        let clock = ManualClock::new(Timestamp::UNIX_EPOCH);
        let cache = client_cache().with_clock(Arc::new(clock.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("countries-all");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        clock.advance(SignedDuration::from_mins(4));
        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(SignedDuration::from_mins(2));
        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ttl_is_taken_from_the_caller() {
        let clock = ManualClock::new(Timestamp::UNIX_EPOCH);
        let cache = client_cache().with_clock(Arc::new(clock.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let short = ResolveOptions::builder().ttl(Duration::from_secs(1)).build();
        let k = key("country-deu");

        cache.resolve(&k, counting(&calls, vec![]), &short).await.unwrap();
        clock.advance(SignedDuration::from_secs(2));
        cache.resolve(&k, counting(&calls, vec![]), &short).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_produces() {
        let mut payload = TransferPayload::new();
        payload.insert(&key("country-deu"), "[\"DEU\"]");
        let cache = KeyedAsyncCache::new(Arc::new(ClientEnvironment::new(payload)));
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::builder().ttl(Duration::ZERO).build();
        let k = key("country-deu");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_hydrated(&k));
    }

    #[tokio::test]
    async fn disabled_cache_always_produces() {
        let config = CacheConfig::builder().enabled(false).build();
        let cache = KeyedAsyncCache::with_config(Arc::new(ClientEnvironment::empty()), config);
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("countries-all");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_fill_error_slot_and_are_not_cached() {
        let cache = client_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("country-xxx");

        let err = cache
            .resolve::<Vec<String>, _, _>(
                &k,
                {
                    let calls = Arc::clone(&calls);
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(FetchError::from(NetworkError::Status { status: 404 }))
                    }
                },
                &opts,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(cache.last_error(&k), Some(err));

        // the caller decides to retry
        let value = cache
            .resolve(&k, counting(&calls, vec!["XXX".into()]), &opts)
            .await
            .unwrap();
        assert_eq!(value, vec!["XXX".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.last_error(&k).is_none());
    }

    #[tokio::test]
    async fn reusing_a_key_for_another_type_fails_fast() {
        let cache = client_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("countries-all");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        let err = cache
            .resolve::<u32, _, _>(&k, || async { Ok(7) }, &opts)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn client_adopts_transfer_value_without_producing() {
        let mut payload = TransferPayload::new();
        payload.insert(&key("country-deu"), "[\"DEU\"]");
        let cache = KeyedAsyncCache::new(Arc::new(ClientEnvironment::new(payload)));
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();

        let value = cache
            .resolve(&key("country-deu"), counting(&calls, vec![]), &opts)
            .await
            .unwrap();

        assert_eq!(value, vec!["DEU".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_hydrated(&key("country-deu")));

        // a different key never sees the hydrated value
        let other = cache
            .resolve(&key("country-fra"), counting(&calls, vec!["FRA".into()]), &opts)
            .await
            .unwrap();
        assert_eq!(other, vec!["FRA".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_hydrated(&key("country-fra")));
    }

    #[tokio::test]
    async fn sharing_an_adopted_entry_keeps_it_hydrated() {
        let mut payload = TransferPayload::new();
        payload.insert(&key("country-deu"), "[\"DEU\"]");
        let cache = KeyedAsyncCache::new(Arc::new(ClientEnvironment::new(payload)));
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("country-deu");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        assert!(cache.is_hydrated(&k));

        // a caller that joined the entry without producing leaves the mark alone
        let shared = cache.settle(&k, Ok(vec!["DEU".to_string()]), &opts, false);
        assert_eq!(shared.unwrap(), vec!["DEU".to_string()]);
        assert!(cache.is_hydrated(&k));

        let produced = cache.settle(&k, Ok(vec!["DEU".to_string()]), &opts, true);
        assert!(produced.is_ok());
        assert!(!cache.is_hydrated(&k));
    }

    #[tokio::test]
    async fn transfer_value_is_adopted_once() {
        let mut payload = TransferPayload::new();
        payload.insert(&key("country-deu"), "[\"DEU\"]");
        let cache = KeyedAsyncCache::new(Arc::new(ClientEnvironment::new(payload)));
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = ResolveOptions::default();
        let k = key("country-deu");

        cache.resolve(&k, counting(&calls, vec![]), &opts).await.unwrap();
        cache.invalidate(&k).await;
        let value = cache
            .resolve(&k, counting(&calls, vec!["FRESH".into()]), &opts)
            .await
            .unwrap();

        assert_eq!(value, vec!["FRESH".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_hydrated(&k));
    }

    #[tokio::test]
    async fn undecodable_transfer_value_falls_back_to_producer() {
        let mut payload = TransferPayload::new();
        payload.insert(&key("country-deu"), "{not json");
        let cache = KeyedAsyncCache::new(Arc::new(ClientEnvironment::new(payload)));
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .resolve(
                &key("country-deu"),
                counting(&calls, vec!["DEU".into()]),
                &ResolveOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(value, vec!["DEU".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_records_results_for_transfer() {
        let env = Arc::new(ServerEnvironment::new());
        let cache = KeyedAsyncCache::new(env.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .resolve(
                &key("countries-all"),
                counting(&calls, vec!["DEU".into()]),
                &ResolveOptions::default(),
            )
            .await
            .unwrap();
        cache
            .resolve(
                &key("country-deu"),
                counting(&calls, vec!["DEU".into()]),
                &ResolveOptions::builder().use_server_transfer(false).build(),
            )
            .await
            .unwrap();

        let payload = env.payload();
        assert_eq!(payload.get(&key("countries-all")), Some("[\"DEU\"]"));
        assert!(payload.get(&key("country-deu")).is_none());
    }

    #[tokio::test]
    async fn server_never_reads_transfer() {
        let env = Arc::new(ServerEnvironment::new());
        env.write_transfer(&key("country-deu"), "[\"STALE\"]".to_string());
        let cache = KeyedAsyncCache::new(env);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .resolve(
                &key("country-deu"),
                counting(&calls, vec!["DEU".into()]),
                &ResolveOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(value, vec!["DEU".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
