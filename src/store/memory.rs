//! In-memory backing store.
//!
//! Behaves like a single shared Redis instance: clones share state, values
//! expire on their TTL, and `set_available(false)` makes every call fail as
//! if the network were down. Used by tests and for local runs without Redis.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackingStore, StoreConnector, StoreError, StoreResult, StoreWrite};
use crate::cache::GlobPattern;
use crate::config::StoreSettings;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct Shared {
    data: Mutex<HashMap<String, Slot>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

/// In-memory implementation of [`BackingStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.shared.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shared
            .data
            .lock()
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a raw blob, bypassing the engine. Useful for seeding corrupt data.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.shared
            .data
            .lock()
            .insert(key.to_string(), Slot::new(Value::Text(value.to_string())));
    }

    fn check(&self) -> StoreResult<()> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Runs `f` over the live data map after dropping expired keys.
    fn with_data<T>(&self, f: impl FnOnce(&mut HashMap<String, Slot>) -> T) -> StoreResult<T> {
        self.check()?;
        let mut data = self.shared.data.lock();
        let now = Instant::now();
        data.retain(|_, slot| !slot.is_expired(now));
        Ok(f(&mut *data))
    }
}

/// Deadline `ttl_secs` from now. A TTL past the clock's range never expires.
fn expiry(ttl_secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(ttl_secs.max(1)))
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_data(|data| match data.get(key).map(|slot| &slot.value) {
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        })?
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.with_data(|data| {
            data.insert(
                key.to_string(),
                Slot {
                    value: Value::Text(value.to_string()),
                    expires_at: expiry(ttl_secs),
                },
            );
        })
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.with_data(|data| {
            keys.iter()
                .map(|key| match data.get(key).map(|slot| &slot.value) {
                    Some(Value::Text(text)) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    async fn set_many(&self, writes: &[StoreWrite]) -> StoreResult<()> {
        // One lock for the whole batch, so it is observed all at once.
        self.with_data(|data| {
            for write in writes {
                data.insert(
                    write.key.clone(),
                    Slot {
                        value: Value::Text(write.value.clone()),
                        expires_at: expiry(write.ttl_secs),
                    },
                );
            }
        })
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        self.with_data(|data| keys.iter().filter(|key| data.remove(*key).is_some()).count() as u64)
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let glob = GlobPattern::from_store_glob(pattern)
            .map_err(|e| StoreError::Unavailable(format!("invalid pattern: {e}")))?;
        self.with_data(|data| {
            let mut keys: Vec<String> = data.keys().filter(|k| glob.matches(k)).cloned().collect();
            keys.sort();
            keys
        })
    }

    async fn incr_by(&self, key: &str, amount: i64) -> StoreResult<i64> {
        self.with_data(|data| {
            let slot = data
                .entry(key.to_string())
                .or_insert_with(|| Slot::new(Value::Text("0".to_string())));
            let current = match &slot.value {
                Value::Text(text) => text.parse::<i64>().ok(),
                _ => None,
            };
            match current {
                Some(current) => match current.checked_add(amount) {
                    Some(next) => {
                        slot.value = Value::Text(next.to_string());
                        Ok(next)
                    }
                    None => Err(StoreError::Overflow(key.to_string())),
                },
                None => Err(StoreError::WrongType(key.to_string())),
            }
        })?
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.with_data(|data| match data.get_mut(key) {
            Some(slot) => {
                slot.expires_at = expiry(ttl_secs);
                true
            }
            None => false,
        })
    }

    async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        self.with_data(|data| {
            let slot = data
                .entry(key.to_string())
                .or_insert_with(|| Slot::new(Value::Set(BTreeSet::new())));
            match &mut slot.value {
                Value::Set(set) => {
                    Ok(members.iter().filter(|m| set.insert((*m).clone())).count() as u64)
                }
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })?
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_data(|data| match data.get(key).map(|slot| &slot.value) {
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        })?
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.with_data(|data| {
            let slot = data
                .entry(key.to_string())
                .or_insert_with(|| Slot::new(Value::Hash(HashMap::new())));
            match &mut slot.value {
                Value::Hash(hash) => {
                    hash.insert(field.to_string(), value.to_string());
                    Ok(())
                }
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })?
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.with_data(|data| match data.get(key).map(|slot| &slot.value) {
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        })?
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.with_data(|data| match data.get(key).map(|slot| &slot.value) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(HashMap::new()),
        })?
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn disconnect(&self) {}
}

/// Every connection shares the same in-memory data.
#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, _settings: &StoreSettings) -> StoreResult<Arc<dyn BackingStore>> {
        self.check()?;
        Ok(Arc::new(self.clone()))
    }
}
