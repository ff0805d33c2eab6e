//! Analytics snapshot, realtime metric and counter caching.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEngine, Invalidation};
use crate::error::Result;

/// Realtime metrics go stale quickly.
pub const REALTIME_TTL: u64 = 30;

/// Cache over the `analytics:` namespace.
#[derive(Debug, Clone)]
pub struct AnalyticsCache {
    engine: Arc<CacheEngine>,
}

impl AnalyticsCache {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    fn snapshot_key(name: &str, period: &str) -> String {
        format!("snapshot:{}:{}", name, period)
    }

    fn counter_key(event: &str) -> String {
        format!("counter:{}", event)
    }

    fn metrics_key(name: &str) -> String {
        format!("metrics:{}", name)
    }

    // == Snapshots ==
    /// Reads an aggregate for `name` over `period`, computing it on a miss.
    pub async fn get_snapshot<T, F, Fut>(&self, name: &str, period: &str, compute: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.engine
            .get_or_compute(&Self::snapshot_key(name, period), None, compute)
            .await
    }

    pub async fn set_snapshot<T: Serialize + ?Sized>(&self, name: &str, period: &str, snapshot: &T) -> Result<()> {
        self.engine
            .set(&Self::snapshot_key(name, period), snapshot, None)
            .await
    }

    /// Drops the snapshots of one aggregate, or all of them with `None`.
    pub async fn invalidate_snapshots(&self, name: Option<&str>) -> Invalidation {
        let pattern = match name {
            Some(name) => format!("snapshot:{}:*", name),
            None => "snapshot:*".to_string(),
        };
        self.engine.del_pattern(&pattern).await
    }

    // == Realtime ==
    /// Reads a realtime metric with the short realtime TTL.
    pub async fn get_realtime<T, F, Fut>(&self, metric: &str, compute: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.engine
            .get_or_compute(&format!("realtime:{}", metric), Some(REALTIME_TTL), compute)
            .await
    }

    // == Counters ==
    /// Counts one occurrence of `event`, returning the new total.
    pub async fn track_event(&self, event: &str) -> Result<i64> {
        self.engine.incr(&Self::counter_key(event), 1).await
    }

    /// Current total for `event`. An `INCRBY 0` reads the counter atomically
    /// without creating an L1 shadow.
    pub async fn event_count(&self, event: &str) -> Result<i64> {
        self.engine.incr(&Self::counter_key(event), 0).await
    }

    // == Metric Hashes ==
    pub async fn record_metric<T: Serialize + ?Sized>(&self, name: &str, field: &str, value: &T) -> Result<()> {
        self.engine
            .hset(
                &Self::metrics_key(name),
                field,
                value,
                Some(self.engine.default_ttl()),
            )
            .await
    }

    pub async fn metric<T: DeserializeOwned>(&self, name: &str, field: &str) -> Result<Option<T>> {
        self.engine.hget(&Self::metrics_key(name), field).await
    }

    pub async fn metrics<T: DeserializeOwned>(&self, name: &str) -> Result<HashMap<String, T>> {
        self.engine.hgetall(&Self::metrics_key(name)).await
    }
}
