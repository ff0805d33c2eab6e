//! Tiered Cache - a two-tier cache engine
//!
//! A bounded in-process L1 with TTL expiry in front of a shared Redis L2,
//! with read-through fallbacks, pattern invalidation, warming, domain facades
//! and a per-category instance registry.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod facades;
pub mod models;
pub mod registry;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, CacheStats, EngineOptions, Invalidation, WarmEntry, WarmReport};
pub use config::{Config, StoreSettings};
pub use error::{CacheError, Result};
pub use facades::{AnalyticsCache, CachePolicy, Category, ContentCache, UserCache};
pub use registry::CacheRegistry;
pub use store::{BackingStore, MemoryStore, RedisConnector, RedisStore, StoreConnector};
pub use tasks::spawn_maintenance_task;
