//! Cache Module
//!
//! The two-tier cache engine: a bounded in-process L1 with TTL expiry and
//! insertion-order eviction, in front of a shared L2 backing store.

pub mod codec;
mod engine;
mod entry;
mod local;
mod order;
mod pattern;
mod stats;
mod warm;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{CacheEngine, EngineOptions, Invalidation};
pub use entry::CacheEntry;
pub use local::LocalCache;
pub use order::InsertionOrder;
pub use pattern::GlobPattern;
pub use stats::{CacheStats, StatsRecorder};
pub use warm::{WarmEntry, WarmReport};

// == Public Constants ==
/// Maximum allowed length of a fully namespaced key, in bytes
pub const MAX_KEY_LENGTH: usize = 1024;
