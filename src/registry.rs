//! Instance Registry
//!
//! Builds one engine per category on first use and hands out shared
//! references to it. Constructed once at startup and passed around by `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::cache::{CacheEngine, EngineOptions};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::facades::{AnalyticsCache, Category, ContentCache, UserCache};
use crate::store::{RedisConnector, StoreConnector};

// == Cache Registry ==
/// Memoized engines keyed by instance name.
pub struct CacheRegistry {
    config: Config,
    connector: Arc<dyn StoreConnector>,
    instances: Mutex<HashMap<String, Arc<CacheEngine>>>,
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}

impl CacheRegistry {
    /// Registry whose engines talk to Redis.
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(RedisConnector))
    }

    /// Registry with a custom store connector, e.g. an in-memory store.
    pub fn with_connector(config: Config, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Get Instance ==
    /// Returns the engine of `category`, connecting it on first request.
    pub async fn get_instance(&self, category: Category) -> Result<Arc<CacheEngine>> {
        let policy = category.policy();
        self.get_or_create(category.as_str(), policy.prefix, policy.default_ttl)
            .await
    }

    /// Returns the engine registered under `name`. Known category names map
    /// to their category; any other name gets the `{name}:` prefix and the
    /// configured default TTL.
    pub async fn get_named(&self, name: &str) -> Result<Arc<CacheEngine>> {
        if let Ok(category) = name.parse::<Category>() {
            return self.get_instance(category).await;
        }
        if name.is_empty() || name.contains('*') {
            return Err(CacheError::Config(format!(
                "Invalid cache instance name: {:?}",
                name
            )));
        }
        let prefix = format!("{}:", name);
        self.get_or_create(name, &prefix, self.config.default_ttl)
            .await
    }

    async fn get_or_create(&self, name: &str, prefix: &str, default_ttl: u64) -> Result<Arc<CacheEngine>> {
        let mut instances = self.instances.lock().await;
        if let Some(engine) = instances.get(name) {
            return Ok(Arc::clone(engine));
        }

        let store = self.connector.connect(&self.config.store).await?;
        let options = EngineOptions {
            namespace: format!("{}{}", self.config.key_prefix, prefix),
            default_ttl,
            l1_capacity: self.config.l1_capacity,
            single_flight: self.config.single_flight,
        };
        info!(
            instance = %name,
            namespace = %options.namespace,
            default_ttl,
            "Created cache engine"
        );

        let engine = Arc::new(CacheEngine::new(store, options));
        instances.insert(name.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// The engine registered under `name`, without creating one.
    pub async fn existing(&self, name: &str) -> Option<Arc<CacheEngine>> {
        let name = match name.parse::<Category>() {
            Ok(category) => category.as_str().to_string(),
            Err(_) => name.to_string(),
        };
        self.instances.lock().await.get(&name).cloned()
    }

    // == Facades ==
    pub async fn users(&self) -> Result<UserCache> {
        Ok(UserCache::new(self.get_instance(Category::Users).await?))
    }

    pub async fn content(&self) -> Result<ContentCache> {
        Ok(ContentCache::new(self.get_instance(Category::Content).await?))
    }

    pub async fn analytics(&self) -> Result<AnalyticsCache> {
        Ok(AnalyticsCache::new(
            self.get_instance(Category::Analytics).await?,
        ))
    }

    /// Every engine created so far, sorted by name.
    pub async fn instances(&self) -> Vec<(String, Arc<CacheEngine>)> {
        let mut all: Vec<(String, Arc<CacheEngine>)> = self
            .instances
            .lock()
            .await
            .iter()
            .map(|(name, engine)| (name.clone(), Arc::clone(engine)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    // == Shutdown ==
    /// Disconnects every engine and forgets it. Meant for process shutdown;
    /// a later `get_instance` starts over with a fresh connection.
    pub async fn disconnect_all(&self) {
        let drained: Vec<(String, Arc<CacheEngine>)> =
            self.instances.lock().await.drain().collect();
        for (name, engine) in &drained {
            engine.disconnect().await;
            info!(instance = %name, "Disconnected cache instance");
        }
        info!(count = drained.len(), "All cache instances disconnected");
    }
}
