//! Cache Engine Module
//!
//! Orchestrates the two tiers. Reads go L1, then L2, then the caller's
//! fallback; writes go to both tiers; invalidation prunes both tiers.
//!
//! The L1 mutex is a `parking_lot` lock and is never held across an await.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex as FlightLock, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{
    codec, CacheStats, GlobPattern, LocalCache, StatsRecorder, WarmEntry, WarmReport,
    MAX_KEY_LENGTH,
};
use crate::error::{CacheError, Result};
use crate::store::{BackingStore, StoreWrite};

// == Engine Options ==
/// Construction-time parameters of one engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Prefix prepended to every key suffix
    pub namespace: String,
    /// TTL in seconds used when a call does not supply one
    pub default_ttl: u64,
    /// Maximum number of L1 entries
    pub l1_capacity: usize,
    /// Coalesce concurrent read-through misses on the same key
    pub single_flight: bool,
}

impl EngineOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl = ttl_secs;
        self
    }

    pub fn l1_capacity(mut self, capacity: usize) -> Self {
        self.l1_capacity = capacity;
        self
    }

    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            default_ttl: 300,
            l1_capacity: 1000,
            single_flight: true,
        }
    }
}

// == Invalidation ==
/// Keys removed by a pattern invalidation, per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Invalidation {
    pub l2_removed: u64,
    pub l1_removed: usize,
}

/// Result of an L2 lookup on the read path.
enum Remote<T> {
    Found(T),
    Absent,
    Failed,
}

// == Flight Guard ==
/// Held by the one caller currently resolving a key. Dropping it releases
/// the waiters and removes the map entry once nobody else is queued.
struct FlightGuard<'a> {
    in_flight: &'a DashMap<String, Arc<FlightLock<()>>>,
    key: String,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Map entry plus our own permit: no waiters left.
        self.in_flight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

// == Pending Read ==
/// An L2 read registered with L1. Dropping it unregisters the read, also when
/// the reading future is cancelled.
struct PendingRead<'a> {
    local: &'a Mutex<LocalCache>,
    key: &'a str,
    ticket: u64,
}

impl<'a> PendingRead<'a> {
    fn begin(local: &'a Mutex<LocalCache>, key: &'a str) -> Self {
        let ticket = local.lock().begin_read(key);
        Self { local, key, ticket }
    }

    /// Stores `blob` in L1 unless the key changed locally since `begin`.
    fn promote(&self, blob: String, ttl_secs: u64) -> bool {
        self.local.lock().promote(self.key, blob, ttl_secs, self.ticket)
    }
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.local.lock().finish_read(self.key);
    }
}

// == Cache Engine ==
/// Two-tier cache over one key namespace.
pub struct CacheEngine {
    store: Arc<dyn BackingStore>,
    local: Mutex<LocalCache>,
    stats: StatsRecorder,
    namespace: String,
    default_ttl: u64,
    single_flight: bool,
    in_flight: DashMap<String, Arc<FlightLock<()>>>,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .field("single_flight", &self.single_flight)
            .finish_non_exhaustive()
    }
}

impl CacheEngine {
    // == Constructor ==
    pub fn new(store: Arc<dyn BackingStore>, options: EngineOptions) -> Self {
        Self {
            store,
            local: Mutex::new(LocalCache::new(options.l1_capacity)),
            stats: StatsRecorder::new(),
            namespace: options.namespace,
            default_ttl: options.default_ttl,
            single_flight: options.single_flight,
            in_flight: DashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    /// The fully namespaced key for `suffix`.
    pub fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.namespace, suffix)
    }

    fn ttl_or_default(&self, ttl: Option<u64>) -> u64 {
        ttl.unwrap_or(self.default_ttl).max(1)
    }

    fn validated_key(&self, suffix: &str) -> Result<String> {
        if suffix.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        let full_key = self.key(suffix);
        if full_key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(full_key)
    }

    // == L1 Helpers ==
    fn local_get<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        let blob = self.local.lock().get(full_key)?;
        match codec::decode(&blob) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Dropping undecodable L1 entry");
                self.local.lock().remove(full_key);
                None
            }
        }
    }

    fn local_insert(&self, full_key: &str, blob: String, ttl_secs: u64) {
        let evicted = self.local.lock().insert(full_key.to_string(), blob, ttl_secs);
        if let Some(evicted) = evicted {
            debug!(key = %evicted, "Evicted oldest L1 entry");
        }
    }

    /// Reads `full_key` from L2 and promotes a decodable value into L1.
    ///
    /// The promotion is skipped if a write, delete or invalidation of the key
    /// landed locally while the read was in flight.
    async fn remote_get<T: DeserializeOwned>(&self, full_key: &str, ttl_secs: u64) -> Remote<T> {
        let pending = PendingRead::begin(&self.local, full_key);
        match self.store.get(full_key).await {
            Ok(Some(blob)) => match codec::decode(&blob) {
                Ok(value) => {
                    if !pending.promote(blob, ttl_secs) {
                        debug!(key = %full_key, "Skipped promotion of a superseded L2 read");
                    }
                    Remote::Found(value)
                }
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Treating undecodable L2 value as a miss");
                    Remote::Absent
                }
            },
            Ok(None) => Remote::Absent,
            Err(e) => {
                self.stats.record_l2_error();
                warn!(key = %full_key, error = %e, "L2 read failed");
                Remote::Failed
            }
        }
    }

    // == Get ==
    /// Looks `key` up in L1, then L2. Never fails: an L2 error reads as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.key(key);

        if let Some(value) = self.local_get(&full_key) {
            self.stats.record_l1_hit();
            debug!(key = %full_key, "cache hit (L1)");
            return Some(value);
        }

        match self.remote_get(&full_key, self.default_ttl).await {
            Remote::Found(value) => {
                self.stats.record_l2_hit();
                debug!(key = %full_key, "cache hit (L2)");
                Some(value)
            }
            Remote::Absent | Remote::Failed => {
                self.stats.record_miss();
                debug!(key = %full_key, "cache miss");
                None
            }
        }
    }

    // == Get Or Compute ==
    /// Read-through lookup.
    ///
    /// On a miss in both tiers `fallback` is invoked once and a `Some` result
    /// is written to both tiers with `ttl` (or the engine default). If L2
    /// cannot be read the fallback result is returned without being cached.
    /// Only a failing fallback produces an error.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<u64>,
        fallback: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let full_key = self.key(key);
        let ttl_secs = self.ttl_or_default(ttl);

        if let Some(value) = self.local_get(&full_key) {
            self.stats.record_l1_hit();
            debug!(key = %full_key, "cache hit (L1)");
            return Ok(Some(value));
        }

        let _flight = if self.single_flight {
            let guard = self.join_flight(&full_key).await;
            // Another caller may have filled L1 while we waited.
            if let Some(value) = self.local_get(&full_key) {
                self.stats.record_l1_hit();
                debug!(key = %full_key, "cache hit (L1) after waiting on in-flight load");
                return Ok(Some(value));
            }
            Some(guard)
        } else {
            None
        };

        match self.remote_get(&full_key, ttl_secs).await {
            Remote::Found(value) => {
                self.stats.record_l2_hit();
                debug!(key = %full_key, "cache hit (L2)");
                Ok(Some(value))
            }
            Remote::Absent => {
                self.stats.record_miss();
                let value = self.invoke(&full_key, fallback).await?;
                if let Some(value) = &value {
                    if let Err(e) = self.write_both(&full_key, value, ttl_secs).await {
                        warn!(key = %full_key, error = %e, "Failed to cache fallback result");
                    }
                }
                Ok(value)
            }
            Remote::Failed => {
                self.stats.record_miss();
                self.invoke(&full_key, fallback).await
            }
        }
    }

    async fn invoke<T, F, Fut>(&self, full_key: &str, fallback: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.stats.record_fallback();
        debug!(key = %full_key, "Invoking fallback");
        fallback().await.map_err(CacheError::Fallback)
    }

    async fn join_flight(&self, full_key: &str) -> FlightGuard<'_> {
        let lock = self
            .in_flight
            .entry(full_key.to_string())
            .or_insert_with(|| Arc::new(FlightLock::new(())))
            .clone();
        let permit = lock.lock_owned().await;
        FlightGuard {
            in_flight: &self.in_flight,
            key: full_key.to_string(),
            _permit: permit,
        }
    }

    // == Set ==
    /// Writes `value` to both tiers. L1 is updated even when the L2 write
    /// fails; the L2 error is still returned.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        let full_key = self.validated_key(key)?;
        self.write_both(&full_key, value, self.ttl_or_default(ttl))
            .await
    }

    async fn write_both<T: Serialize + ?Sized>(
        &self,
        full_key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        let blob = codec::encode(value)?;
        self.local_insert(full_key, blob.clone(), ttl_secs);
        let written = self.store.set_ex(full_key, &blob, ttl_secs).await;
        // Reads that started before L2 took the write must not promote.
        self.local.lock().fence(full_key);
        written?;
        debug!(key = %full_key, ttl = ttl_secs, "cache set");
        Ok(())
    }

    // == Delete ==
    /// Removes `key` from both tiers, returning whether L2 held it.
    pub async fn del(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        self.local.lock().remove(&full_key);
        let removed = self.store.del(std::slice::from_ref(&full_key)).await;
        self.local.lock().remove(&full_key);
        Ok(removed? > 0)
    }

    // == Batch Get ==
    /// Reads many keys with one L2 round trip. The result is in input order,
    /// with `None` for absent or undecodable keys.
    ///
    /// If the round trip fails, fresh L1 shadows are served instead.
    pub async fn mget<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        if keys.is_empty() {
            return Vec::new();
        }
        let full_keys: Vec<String> = keys.iter().map(|k| self.key(k.as_ref())).collect();

        match self.store.mget(&full_keys).await {
            Ok(blobs) => {
                let values: Vec<Option<T>> = full_keys
                    .iter()
                    .zip(blobs)
                    .map(|(full_key, blob)| {
                        let blob = blob?;
                        match codec::decode(&blob) {
                            Ok(value) => Some(value),
                            Err(e) => {
                                warn!(key = %full_key, error = %e, "Treating undecodable L2 value as a miss");
                                None
                            }
                        }
                    })
                    .collect();
                for value in &values {
                    if value.is_some() {
                        self.stats.record_l2_hit();
                    } else {
                        self.stats.record_miss();
                    }
                }
                values
            }
            Err(e) => {
                self.stats.record_l2_error();
                warn!(keys = full_keys.len(), error = %e, "L2 batch read failed, serving L1");
                full_keys
                    .iter()
                    .map(|full_key| {
                        let value = self.local_get(full_key);
                        if value.is_some() {
                            self.stats.record_l1_hit();
                        } else {
                            self.stats.record_miss();
                        }
                        value
                    })
                    .collect()
            }
        }
    }

    // == Batch Set ==
    /// Writes every pair in one atomic L2 pipeline and populates L1.
    pub async fn mset<K, T>(&self, entries: &[(K, T)], ttl: Option<u64>) -> Result<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let ttl_secs = self.ttl_or_default(ttl);
        let mut writes = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let full_key = self.validated_key(key.as_ref())?;
            writes.push(StoreWrite::new(full_key, codec::encode(value)?, ttl_secs));
        }
        if writes.is_empty() {
            return Ok(());
        }

        self.populate_local(&writes);
        let written = self.store.set_many(&writes).await;
        self.fence_local(&writes);
        written?;
        debug!(count = writes.len(), "cache mset");
        Ok(())
    }

    fn populate_local(&self, writes: &[StoreWrite]) {
        let mut local = self.local.lock();
        for write in writes {
            local.insert(write.key.clone(), write.value.clone(), write.ttl_secs);
        }
    }

    fn fence_local(&self, writes: &[StoreWrite]) {
        let mut local = self.local.lock();
        for write in writes {
            local.fence(&write.key);
        }
    }

    // == Pattern Invalidation ==
    /// Deletes every key matching the `*` glob `pattern` (relative to the
    /// namespace) from both tiers.
    ///
    /// L2 failures are logged and reported as zero removals; L1 is pruned
    /// regardless.
    pub async fn del_pattern(&self, pattern: &str) -> Invalidation {
        let full_pattern = self.key(pattern);
        let glob = match GlobPattern::new(&full_pattern) {
            Ok(glob) => glob,
            Err(e) => {
                warn!(pattern = %full_pattern, error = %e, "Invalid invalidation pattern");
                return Invalidation::default();
            }
        };

        let l2_removed = match self.store.keys(&glob.to_store_glob()).await {
            Ok(keys) if keys.is_empty() => 0,
            Ok(keys) => match self.store.del(&keys).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(pattern = %full_pattern, error = %e, "L2 pattern delete failed");
                    0
                }
            },
            Err(e) => {
                warn!(pattern = %full_pattern, error = %e, "L2 key enumeration failed");
                0
            }
        };
        let l1_removed = self.local.lock().remove_matching(&glob);

        info!(pattern = %full_pattern, l2_removed, l1_removed, "Invalidated pattern");
        Invalidation {
            l2_removed,
            l1_removed,
        }
    }

    /// Removes every key of this namespace from both tiers.
    pub async fn clear(&self) -> Invalidation {
        self.del_pattern("*").await
    }

    // == Counters ==
    /// Atomically adds `amount` in L2. Any L1 shadow of the key is dropped.
    pub async fn incr(&self, key: &str, amount: i64) -> Result<i64> {
        let full_key = self.validated_key(key)?;
        self.local.lock().remove(&full_key);
        let total = self.store.incr_by(&full_key, amount).await;
        self.local.lock().remove(&full_key);
        Ok(total?)
    }

    // == Sets ==
    /// Adds members to an L2 set, optionally (re)setting its TTL.
    pub async fn sadd<M: AsRef<str>>(&self, key: &str, members: &[M], ttl: Option<u64>) -> Result<u64> {
        let full_key = self.validated_key(key)?;
        let members: Vec<String> = members.iter().map(|m| m.as_ref().to_string()).collect();
        if members.is_empty() {
            return Ok(0);
        }
        let added = self.store.sadd(&full_key, &members).await?;
        if let Some(ttl) = ttl {
            self.store.expire(&full_key, ttl.max(1)).await?;
        }
        Ok(added)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.store.smembers(&self.key(key)).await?)
    }

    // == Hashes ==
    /// Stores one serialized hash field, optionally (re)setting the hash TTL.
    pub async fn hset<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        let full_key = self.validated_key(key)?;
        let blob = codec::encode(value)?;
        self.store.hset(&full_key, field, &blob).await?;
        if let Some(ttl) = ttl {
            self.store.expire(&full_key, ttl.max(1)).await?;
        }
        Ok(())
    }

    /// Reads one hash field. An undecodable field reads as absent.
    pub async fn hget<T: DeserializeOwned>(&self, key: &str, field: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let Some(blob) = self.store.hget(&full_key, field).await? else {
            return Ok(None);
        };
        match codec::decode(&blob) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %full_key, field = %field, error = %e, "Undecodable hash field");
                Ok(None)
            }
        }
    }

    /// Reads every hash field, skipping undecodable ones.
    pub async fn hgetall<T: DeserializeOwned>(&self, key: &str) -> Result<HashMap<String, T>> {
        let full_key = self.key(key);
        let fields = self.store.hgetall(&full_key).await?;
        let mut decoded = HashMap::with_capacity(fields.len());
        for (field, blob) in fields {
            match codec::decode(&blob) {
                Ok(value) => {
                    decoded.insert(field, value);
                }
                Err(e) => {
                    warn!(key = %full_key, field = %field, error = %e, "Undecodable hash field");
                }
            }
        }
        Ok(decoded)
    }

    // == Warming ==
    /// Computes every entry concurrently, then writes all successes in one L2
    /// batch and into L1. A failing computation is logged and listed in the
    /// report; only the batch write itself can fail the call.
    pub async fn warm_cache(&self, entries: Vec<WarmEntry>) -> Result<WarmReport> {
        let computations = entries.into_iter().map(|entry| async move {
            let WarmEntry { key, ttl, compute } = entry;
            let outcome = compute().await;
            (key, ttl, outcome)
        });
        let results = futures::future::join_all(computations).await;

        let mut writes = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (key, ttl, outcome) in results {
            let full_key = match self.validated_key(&key) {
                Ok(full_key) => full_key,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping warm entry");
                    failed.push(key);
                    continue;
                }
            };
            match outcome {
                Ok(blob) => writes.push(StoreWrite::new(full_key, blob, self.ttl_or_default(ttl))),
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Warm computation failed");
                    failed.push(key);
                }
            }
        }

        if !writes.is_empty() {
            self.populate_local(&writes);
            let written = self.store.set_many(&writes).await;
            self.fence_local(&writes);
            written?;
        }

        info!(
            namespace = %self.namespace,
            warmed = writes.len(),
            failed = failed.len(),
            "Cache warmed"
        );
        Ok(WarmReport {
            warmed: writes.len(),
            failed,
        })
    }

    // == Maintenance ==
    /// Drops the L1 tier only.
    pub fn clear_local(&self) {
        self.local.lock().clear();
    }

    /// Drops stale L1 entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.local.lock().purge_expired()
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    pub fn stats(&self) -> CacheStats {
        let local = self.local.lock();
        self.stats
            .snapshot(&self.namespace, local.len(), local.capacity(), local.evictions())
    }

    /// Closes the L2 connection and drops all local state.
    pub async fn disconnect(&self) {
        self.store.disconnect().await;
        self.clear_local();
        self.in_flight.clear();
        info!(namespace = %self.namespace, "Cache engine disconnected");
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u32,
        name: String,
    }

    fn engine_over(store: &MemoryStore, capacity: usize) -> CacheEngine {
        CacheEngine::new(
            Arc::new(store.clone()),
            EngineOptions::new("test:").l1_capacity(capacity),
        )
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        let profile = Profile {
            id: 42,
            name: "Ann".to_string(),
        };

        engine.set("profile:42", &profile, None).await.unwrap();

        assert_eq!(engine.get::<Profile>("profile:42").await, Some(profile));
        assert!(store.get("test:profile:42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_l2_hit_is_promoted_to_l1() {
        let store = MemoryStore::new();
        store.insert_raw("test:k", "\"v\"");
        let engine = engine_over(&store, 10);

        assert_eq!(engine.get::<String>("k").await.as_deref(), Some("v"));
        let calls = store.calls();
        assert_eq!(engine.get::<String>("k").await.as_deref(), Some("v"));
        assert_eq!(store.calls(), calls, "second read must not touch L2");

        let stats = engine.stats();
        assert_eq!(stats.l2_hits, 1);
        assert_eq!(stats.l1_hits, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_invokes_fallback_once() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = engine
                .get_or_compute("answer", Some(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(42u32))
                })
                .await
                .unwrap();
            assert_eq!(value, Some(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.stats().fallback_calls, 1);
    }

    #[tokio::test]
    async fn test_none_from_fallback_is_not_cached() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);

        let value: Option<u32> = engine
            .get_or_compute("nothing", None, || async { Ok(None) })
            .await
            .unwrap();

        assert_eq!(value, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failing_fallback_is_an_error() {
        let engine = engine_over(&MemoryStore::new(), 10);

        let result: Result<Option<u32>> = engine
            .get_or_compute("k", None, || async { Err(anyhow::anyhow!("db down")) })
            .await;

        assert!(matches!(result, Err(CacheError::Fallback(_))));
    }

    #[tokio::test]
    async fn test_l2_outage_reads_degrade_writes_fail() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        store.set_available(false);

        assert_eq!(engine.get::<u32>("k").await, None);

        let value = engine
            .get_or_compute("k", None, || async { Ok(Some(7u32)) })
            .await
            .unwrap();
        assert_eq!(value, Some(7));

        // Fallback result is not cached while L2 is unreadable
        assert_eq!(engine.stats().l1_size, 0);

        let err = engine.set("k", &1u32, None).await.unwrap_err();
        assert!(matches!(err, CacheError::Store(_)));
        // L1 still takes the write
        assert_eq!(engine.get::<u32>("k").await, Some(1));
        assert_eq!(engine.stats().l2_errors, 2);
    }

    #[tokio::test]
    async fn test_single_flight_coalesces_concurrent_misses() {
        let store = MemoryStore::new();
        let engine = Arc::new(engine_over(&store, 10));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                engine
                    .get_or_compute("hot", None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Some("computed".to_string()))
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("computed"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(engine.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_mget_preserves_order() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        engine.set("a", &1u32, None).await.unwrap();
        engine.set("c", &3u32, None).await.unwrap();

        let values: Vec<Option<u32>> = engine.mget(&["a", "b", "c"]).await;
        assert_eq!(values, vec![Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn test_mget_serves_l1_when_l2_is_down() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        engine.set("a", &1u32, None).await.unwrap();
        store.set_available(false);

        let values: Vec<Option<u32>> = engine.mget(&["a", "b"]).await;
        assert_eq!(values, vec![Some(1), None]);
    }

    #[tokio::test]
    async fn test_mset_writes_both_tiers() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);

        engine
            .mset(&[("a", 1u32), ("b", 2u32)], Some(60))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(engine.stats().l1_size, 2);
    }

    #[tokio::test]
    async fn test_del_pattern_prunes_both_tiers() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        engine.set("list:5:1", &"a", None).await.unwrap();
        engine.set("list:5:2", &"b", None).await.unwrap();
        engine.set("list:6:1", &"c", None).await.unwrap();

        let report = engine.del_pattern("list:5:*").await;

        assert_eq!(
            report,
            Invalidation {
                l2_removed: 2,
                l1_removed: 2
            }
        );
        assert_eq!(engine.get::<String>("list:5:1").await, None);
        assert_eq!(engine.get::<String>("list:6:1").await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_del_pattern_prunes_l1_when_l2_is_down() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        engine.set("a:1", &1u32, None).await.unwrap();
        store.set_available(false);

        let report = engine.del_pattern("a:*").await;

        assert_eq!(report.l2_removed, 0);
        assert_eq!(report.l1_removed, 1);
    }

    #[tokio::test]
    async fn test_incr_bypasses_l1() {
        let engine = engine_over(&MemoryStore::new(), 10);

        assert_eq!(engine.incr("views", 1).await.unwrap(), 1);
        assert_eq!(engine.incr("views", 5).await.unwrap(), 6);
        assert_eq!(engine.stats().l1_size, 0);
    }

    #[tokio::test]
    async fn test_hash_fields_are_serialized_independently() {
        let engine = engine_over(&MemoryStore::new(), 10);

        engine.hset("metrics", "p50", &12.5f64, None).await.unwrap();
        engine.hset("metrics", "count", &3u64, Some(60)).await.unwrap();

        assert_eq!(engine.hget::<f64>("metrics", "p50").await.unwrap(), Some(12.5));
        assert_eq!(engine.hget::<u64>("metrics", "missing").await.unwrap(), None);
        let all: HashMap<String, serde_json::Value> = engine.hgetall("metrics").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_set_members() {
        let engine = engine_over(&MemoryStore::new(), 10);

        assert_eq!(engine.sadd("s", &["a", "b"], Some(60)).await.unwrap(), 2);
        assert_eq!(engine.sadd("s", &["b"], None).await.unwrap(), 0);

        let mut members = engine.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_warm_cache_isolates_failures() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);

        let report = engine
            .warm_cache(vec![
                WarmEntry::new("one", None, || async { Ok(1u32) }),
                WarmEntry::new("two", None, || async {
                    Err::<u32, _>(anyhow::anyhow!("boom"))
                }),
                WarmEntry::new("three", Some(60), || async { Ok(3u32) }),
            ])
            .await
            .unwrap();

        assert_eq!(report.warmed, 2);
        assert_eq!(report.failed, vec!["two".to_string()]);
        assert_eq!(store.len(), 2);
        assert_eq!(engine.get::<u32>("three").await, Some(3));
    }

    #[tokio::test]
    async fn test_key_validation() {
        let engine = engine_over(&MemoryStore::new(), 10);

        assert!(matches!(
            engine.set("", &1u32, None).await,
            Err(CacheError::InvalidKey(_))
        ));
        let long = "k".repeat(MAX_KEY_LENGTH);
        assert!(matches!(
            engine.set(&long, &1u32, None).await,
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_clears_local_state() {
        let store = MemoryStore::new();
        let engine = engine_over(&store, 10);
        engine.set("a", &1u32, None).await.unwrap();

        engine.disconnect().await;

        assert_eq!(engine.stats().l1_size, 0);
    }
}
