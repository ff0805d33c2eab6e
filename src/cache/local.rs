//! Local Cache Module
//!
//! The bounded in-process L1 tier: a HashMap of entries plus insertion-order
//! tracking for eviction. Expiry is checked lazily when a key is read.
//!
//! Reads that miss L1 and go to L2 register a pending read first. Any write,
//! removal or invalidation of that key while the read is outstanding bumps
//! its generation, and the read's promotion is then refused so an older L2
//! value cannot overwrite a newer local state.

use std::collections::HashMap;
use std::time::Instant;

use crate::cache::{CacheEntry, GlobPattern, InsertionOrder};

/// Outstanding L2 reads of one key.
#[derive(Debug, Default)]
struct PendingRead {
    readers: usize,
    generation: u64,
}

// == Local Cache ==
/// Bounded L1 storage with insertion-order eviction and TTL support.
#[derive(Debug)]
pub struct LocalCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, for eviction
    order: InsertionOrder,
    /// Keys with an L2 read in progress
    pending: HashMap<String, PendingRead>,
    /// Maximum number of entries allowed
    capacity: usize,
    /// Entries evicted because the cache was full
    evictions: u64,
}

impl LocalCache {
    // == Constructor ==
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            pending: HashMap::new(),
            capacity,
            evictions: 0,
        }
    }

    // == Get ==
    /// Returns the value if present and fresh.
    ///
    /// A stale entry is dropped on the spot and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.drop_entry(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Insert ==
    /// Stores `value` under `key` for `ttl_secs` seconds.
    ///
    /// If the key is new and the cache is full, the oldest-inserted entry is
    /// evicted first; its key is returned. A zero-capacity cache stores nothing.
    /// Pending L2 reads of `key` will not promote over this value.
    pub fn insert(&mut self, key: String, value: String, ttl_secs: u64) -> Option<String> {
        self.fence(&key);
        self.put(key, value, ttl_secs)
    }

    fn put(&mut self, key: String, value: String, ttl_secs: u64) -> Option<String> {
        if self.capacity == 0 {
            return None;
        }

        let mut evicted = None;
        if self.entries.contains_key(&key) {
            self.order.remove(&key);
        } else if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_oldest() {
                self.entries.remove(&oldest);
                self.evictions += 1;
                evicted = Some(oldest);
            }
        }

        self.order.record_insert(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl_secs));
        evicted
    }

    // == Pending Reads ==
    /// Registers an L2 read of `key` and returns its generation ticket.
    pub fn begin_read(&mut self, key: &str) -> u64 {
        let pending = self.pending.entry(key.to_string()).or_default();
        pending.readers += 1;
        pending.generation
    }

    /// Unregisters one L2 read of `key`.
    pub fn finish_read(&mut self, key: &str) {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.readers = pending.readers.saturating_sub(1);
            if pending.readers == 0 {
                self.pending.remove(key);
            }
        }
    }

    /// Stores a value read from L2, unless `key` was written, removed or
    /// invalidated since `begin_read` handed out `ticket`. Returns whether
    /// the value was stored.
    pub fn promote(&mut self, key: &str, value: String, ttl_secs: u64, ticket: u64) -> bool {
        let current = self.pending.get(key).map(|pending| pending.generation);
        if current != Some(ticket) {
            return false;
        }
        self.put(key.to_string(), value, ttl_secs);
        true
    }

    /// Refuses the promotion of every L2 read of `key` still in progress.
    pub fn fence(&mut self, key: &str) {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.generation += 1;
        }
    }

    // == Remove ==
    /// Removes an entry by key, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.fence(key);
        self.drop_entry(key)
    }

    fn drop_entry(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            true
        } else {
            false
        }
    }

    // == Remove Matching ==
    /// Removes every key covered by `pattern`, fresh or stale.
    pub fn remove_matching(&mut self, pattern: &GlobPattern) -> usize {
        for (key, pending) in self.pending.iter_mut() {
            if pattern.matches(key) {
                pending.generation += 1;
            }
        }

        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();

        for key in &doomed {
            self.drop_entry(key);
        }
        doomed.len()
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.drop_entry(key);
        }
        expired.len()
    }

    /// Drops every entry and refuses every pending promotion. The eviction
    /// counter is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        for pending in self.pending.values_mut() {
            pending.generation += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}
