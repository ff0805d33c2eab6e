//! Cache Statistics Module
//!
//! Lock-free counters updated on the read path, and the serializable snapshot
//! computed from them on demand.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Recorder ==
/// Counters shared by every caller of one engine.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    fallback_calls: AtomicU64,
    l2_errors: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup that found nothing usable in either tier.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l2_error(&self) {
        self.l2_errors.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads every counter into a [`CacheStats`] value.
    pub fn snapshot(
        &self,
        namespace: &str,
        l1_size: usize,
        l1_capacity: usize,
        evictions: u64,
    ) -> CacheStats {
        CacheStats {
            namespace: namespace.to_string(),
            l1_size,
            l1_capacity,
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallback_calls: self.fallback_calls.load(Ordering::Relaxed),
            l2_errors: self.l2_errors.load(Ordering::Relaxed),
            evictions,
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of one engine's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Key namespace of the engine
    pub namespace: String,
    /// Entries currently held in L1
    pub l1_size: usize,
    /// L1 capacity
    pub l1_capacity: usize,
    /// Lookups answered from L1
    pub l1_hits: u64,
    /// Lookups answered from L2
    pub l2_hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Fallback invocations
    pub fallback_calls: u64,
    /// Failed L2 reads
    pub l2_errors: u64,
    /// L1 entries evicted for capacity
    pub evictions: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Fraction of lookups served by either tier, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Fraction of lookups served by L1 alone.
    pub fn l1_hit_rate(&self) -> f64 {
        let total = self.l1_hits + self.l2_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.l1_hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(recorder: &StatsRecorder) -> CacheStats {
        recorder.snapshot("test:", 0, 10, 0)
    }

    #[test]
    fn test_stats_new() {
        let stats = snapshot(&StatsRecorder::new());
        assert_eq!(stats.l1_hits, 0);
        assert_eq!(stats.l2_hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.namespace, "test:");
        assert_eq!(stats.l1_capacity, 10);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(snapshot(&StatsRecorder::new()).hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_both_tiers() {
        let recorder = StatsRecorder::new();
        recorder.record_l1_hit();
        recorder.record_l2_hit();
        recorder.record_miss();
        recorder.record_miss();

        let stats = snapshot(&recorder);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.l1_hit_rate(), 0.25);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let recorder = StatsRecorder::new();
        recorder.record_l1_hit();
        recorder.record_l1_hit();
        assert_eq!(snapshot(&recorder).hit_rate(), 1.0);
    }

    #[test]
    fn test_fallback_and_error_counters() {
        let recorder = StatsRecorder::new();
        recorder.record_fallback();
        recorder.record_l2_error();
        recorder.record_l2_error();

        let stats = snapshot(&recorder);
        assert_eq!(stats.fallback_calls, 1);
        assert_eq!(stats.l2_errors, 2);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = StatsRecorder::new().snapshot("user:", 3, 100, 2);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["namespace"], "user:");
        assert_eq!(json["l1_size"], 3);
        assert_eq!(json["evictions"], 2);
    }
}
