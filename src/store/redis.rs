//! Redis backing store built on redis-rs's [`ConnectionManager`].
//!
//! The connection is opened lazily on first use unless eager connect is
//! configured. Every command runs under the configured response timeout;
//! idempotent commands are retried on transient failures.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, RedisResult};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::{BackingStore, StoreConnector, StoreError, StoreResult, StoreWrite};
use crate::config::StoreSettings;

/// Redis implementation of [`BackingStore`].
pub struct RedisStore {
    client: Client,
    settings: StoreSettings,
    connection: Mutex<Option<ConnectionManager>>,
    closed: AtomicBool,
}

impl RedisStore {
    /// Creates the client and, unless `lazy_connect` is set, connects right away.
    pub async fn connect(settings: StoreSettings) -> StoreResult<Self> {
        let client = Client::open(settings.url())?;
        let store = Self {
            client,
            settings,
            connection: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        if !store.settings.lazy_connect {
            store.connection().await?;
        }
        Ok(store)
    }

    /// Returns a handle to the shared connection, opening it on first use.
    async fn connection(&self) -> StoreResult<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let mut slot = self.connection.lock().await;
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }

        trace!("Initialize new redis connection manager");
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(self.settings.connect_retries)
            .set_response_timeout(self.settings.response_timeout())
            .set_connection_timeout(self.settings.response_timeout());
        let mut manager = self.client.get_connection_manager_with_config(config).await?;

        if self.settings.ready_check {
            let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
            if pong != "PONG" {
                return Err(StoreError::Unavailable(format!(
                    "ready check answered {pong:?}"
                )));
            }
        }

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            db = self.settings.db,
            "Connected to backing store"
        );
        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// Runs one command with the response timeout, retrying transient
    /// failures when `retry` is set.
    async fn run<T, F, Fut>(&self, op: &'static str, retry: bool, command: F) -> StoreResult<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let attempts = if retry {
            self.settings.max_retries_per_request + 1
        } else {
            1
        };
        let timeout = self.settings.response_timeout();

        let mut attempt = 1;
        loop {
            let result = match self.connection().await {
                Ok(con) => match tokio::time::timeout(timeout, command(con)).await {
                    Ok(reply) => reply.map_err(StoreError::from),
                    Err(_) => Err(StoreError::Timeout(self.settings.response_timeout_ms)),
                },
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_transient() && attempt < attempts => {
                    debug!(op, attempt, error = %e, "Retrying backing store command");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.run("GET", true, |mut con| async move {
            redis::cmd("GET").arg(key).query_async(&mut con).await
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.run("SET", true, |mut con| async move {
            let reply: RedisResult<()> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs.max(1))
                .query_async(&mut con)
                .await;
            reply
        })
        .await
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // Explicit MGET: a single key must still come back as an array.
        self.run("MGET", true, |mut con| async move {
            let mut cmd = redis::cmd("MGET");
            for key in keys {
                cmd.arg(key.as_str());
            }
            cmd.query_async(&mut con).await
        })
        .await
    }

    async fn set_many(&self, writes: &[StoreWrite]) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.run("MULTI SET", true, |mut con| async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            for write in writes {
                pipe.cmd("SET")
                    .arg(write.key.as_str())
                    .arg(write.value.as_str())
                    .arg("EX")
                    .arg(write.ttl_secs.max(1))
                    .ignore();
            }
            let reply: RedisResult<()> = pipe.query_async(&mut con).await;
            reply
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run("DEL", true, |mut con| async move {
            let mut cmd = redis::cmd("DEL");
            for key in keys {
                cmd.arg(key.as_str());
            }
            let deleted: RedisResult<i64> = cmd.query_async(&mut con).await;
            deleted.map(|n| n.max(0) as u64)
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.run("KEYS", true, |mut con| async move {
            redis::cmd("KEYS").arg(pattern).query_async(&mut con).await
        })
        .await
    }

    async fn incr_by(&self, key: &str, amount: i64) -> StoreResult<i64> {
        // Not idempotent: a retried INCRBY may apply twice.
        self.run("INCRBY", false, |mut con| async move {
            redis::cmd("INCRBY").arg(key).arg(amount).query_async(&mut con).await
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.run("EXPIRE", true, |mut con| async move {
            let applied: RedisResult<i64> = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs.max(1))
                .query_async(&mut con)
                .await;
            applied.map(|n| n == 1)
        })
        .await
    }

    async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.run("SADD", true, |mut con| async move {
            let mut cmd = redis::cmd("SADD");
            cmd.arg(key);
            for member in members {
                cmd.arg(member.as_str());
            }
            let added: RedisResult<i64> = cmd.query_async(&mut con).await;
            added.map(|n| n.max(0) as u64)
        })
        .await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.run("SMEMBERS", true, |mut con| async move {
            redis::cmd("SMEMBERS").arg(key).query_async(&mut con).await
        })
        .await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.run("HSET", true, |mut con| async move {
            let reply: RedisResult<i64> = redis::cmd("HSET")
                .arg(key)
                .arg(field)
                .arg(value)
                .query_async(&mut con)
                .await;
            reply.map(|_| ())
        })
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.run("HGET", true, |mut con| async move {
            redis::cmd("HGET").arg(key).arg(field).query_async(&mut con).await
        })
        .await
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.run("HGETALL", true, |mut con| async move {
            redis::cmd("HGETALL").arg(key).query_async(&mut con).await
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        let pong: String = self
            .run("PING", false, |mut con| async move {
                redis::cmd("PING").query_async(&mut con).await
            })
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("PING answered {pong:?}")))
        }
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the last manager handle closes the socket.
        if self.connection.lock().await.take().is_some() {
            info!(host = %self.settings.host, "Disconnected from backing store");
        } else {
            warn!(host = %self.settings.host, "Disconnect requested but no connection was open");
        }
    }
}

/// Connector that opens one [`RedisStore`] per engine instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, settings: &StoreSettings) -> StoreResult<Arc<dyn BackingStore>> {
        let store = RedisStore::connect(settings.clone()).await?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_connect_does_not_touch_network() {
        let settings = StoreSettings {
            port: 1,
            lazy_connect: true,
            ..StoreSettings::default()
        };
        assert!(RedisStore::connect(settings).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_commands() {
        let store = RedisStore::connect(StoreSettings::default()).await.unwrap();
        store.disconnect().await;

        let result = store.get("anything").await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }
}
