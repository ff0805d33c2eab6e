//! Cache Entry Module
//!
//! Defines the structure for individual L1 entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single L1 entry: the encoded value plus the moment it was inserted and
/// how long it stays servable.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value, already encoded
    pub value: String,
    /// When the entry was inserted
    pub inserted_at: Instant,
    /// How long the entry may be served after insertion
    pub ttl: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry with a TTL in seconds.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays valid up to and including `inserted_at + ttl`; it is
    /// expired once strictly more than `ttl` has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}
