//! Content list and item caching.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEngine, Invalidation, WarmEntry, WarmReport};
use crate::error::Result;

/// Cache over the `content:` namespace. List pages are keyed
/// `list:{category}:{page}`, single items `item:{id}`.
#[derive(Debug, Clone)]
pub struct ContentCache {
    engine: Arc<CacheEngine>,
}

impl ContentCache {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    fn list_key(category: &str, page: u32) -> String {
        format!("list:{}:{}", category, page)
    }

    fn item_key(id: &str) -> String {
        format!("item:{}", id)
    }

    // == Lists ==
    pub async fn get_list<T: DeserializeOwned>(&self, category: &str, page: u32) -> Option<T> {
        self.engine.get(&Self::list_key(category, page)).await
    }

    /// Reads a list page, loading it with `load` on a miss.
    pub async fn load_list<T, F, Fut>(&self, category: &str, page: u32, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.engine
            .get_or_compute(&Self::list_key(category, page), None, load)
            .await
    }

    pub async fn set_list<T: Serialize + ?Sized>(&self, category: &str, page: u32, list: &T) -> Result<()> {
        self.engine
            .set(&Self::list_key(category, page), list, None)
            .await
    }

    /// Drops every cached page of one category.
    pub async fn invalidate_lists(&self, category: &str) -> Invalidation {
        self.engine
            .del_pattern(&format!("list:{}:*", category))
            .await
    }

    /// Precomputes the given pages of a category with `load(page)`.
    pub async fn warm_lists<T, F, Fut>(&self, category: &str, pages: &[u32], load: F) -> Result<WarmReport>
    where
        T: Serialize,
        F: Fn(u32) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let entries = pages
            .iter()
            .map(|&page| {
                let load = load.clone();
                WarmEntry::new(Self::list_key(category, page), None, move || load(page))
            })
            .collect();
        self.engine.warm_cache(entries).await
    }

    // == Items ==
    pub async fn get_item<T, F, Fut>(&self, id: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.engine
            .get_or_compute(&Self::item_key(id), None, load)
            .await
    }

    pub async fn set_item<T: Serialize + ?Sized>(&self, id: &str, item: &T) -> Result<()> {
        self.engine.set(&Self::item_key(id), item, None).await
    }

    pub async fn invalidate_item(&self, id: &str) -> Result<bool> {
        self.engine.del(&Self::item_key(id)).await
    }
}
