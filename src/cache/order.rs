//! Insertion Order Module
//!
//! Tracks the order in which keys entered L1 so the oldest-inserted key can be
//! evicted on overflow. Reads never reorder keys.

use std::collections::VecDeque;

// == Insertion Order ==
/// Keys in insertion order:
/// - Front = oldest insert
/// - Back = newest insert
#[derive(Debug, Default)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Record Insert ==
    /// Marks `key` as the newest insert.
    ///
    /// The key must not already be tracked. A re-insert is a `remove`
    /// followed by `record_insert`, which moves the key to the back.
    pub fn record_insert(&mut self, key: &str) {
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest-inserted key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}
