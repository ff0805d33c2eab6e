//! Backing Store Module
//!
//! The L2 tier: a narrow async interface over a networked key-value store.
//! The engine only ever talks to [`BackingStore`]; the Redis client and the
//! in-memory store are interchangeable behind it.

mod error;
mod memory;
mod redis;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::redis::{RedisConnector, RedisStore};

use crate::config::StoreSettings;

/// One entry of a batched write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    pub key: String,
    pub value: String,
    pub ttl_secs: u64,
}

impl StoreWrite {
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl_secs,
        }
    }
}

// == Backing Store ==
/// Operations the engine requires of the shared key-value store.
///
/// Keys passed here are already fully namespaced; implementations must not
/// add their own prefix, otherwise keys returned by [`BackingStore::keys`]
/// could not be fed back into [`BackingStore::del`].
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value EX ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// `MGET key...`, same order as `keys`, `None` for absent keys.
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Writes every entry in one atomic pipeline.
    async fn set_many(&self, writes: &[StoreWrite]) -> StoreResult<()>;

    /// `DEL key...`, returns the number of keys removed.
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// `KEYS pattern` with `*` wildcards.
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// `INCRBY key amount`
    async fn incr_by(&self, key: &str, amount: i64) -> StoreResult<i64>;

    /// `EXPIRE key ttl`, returns whether the key existed.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// `SADD key member...`, returns the number of new members.
    async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<u64>;

    /// `SMEMBERS key`
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// `HSET key field value`
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// `HGET key field`
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// `HGETALL key`
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// `PING`
    async fn ping(&self) -> StoreResult<()>;

    /// Closes the connection. Subsequent calls fail with [`StoreError::Closed`].
    async fn disconnect(&self);
}

// == Store Connector ==
/// Opens a backing store connection for a new engine instance.
///
/// The registry is built over a connector so tests can swap in a fake L2.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, settings: &StoreSettings) -> StoreResult<Arc<dyn BackingStore>>;
}
