//! Cache metrics
//!
//! Counters are an explicitly constructed object shared through `Arc` and
//! injected into every component that records to it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for cache activity
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    store_errors: AtomicU64,
    serialization_errors: AtomicU64,
    computations: AtomicU64,
    coalesced_waits: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub deletes: u64,
    pub store_errors: u64,
    pub serialization_errors: u64,
    pub computations: u64,
    pub coalesced_waits: u64,
}

impl MetricsSnapshot {
    /// Fraction of reads served from the cache (0.0 when nothing was read)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_serialization_error(&self) {
        self.serialization_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            serialization_errors: self.serialization_errors.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_with_no_reads_is_zero() {
        assert!(CacheMetrics::new().snapshot().hit_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn hit_rate_counts_hits_over_reads() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        assert!((metrics.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_write();
        metrics.record_deletes(4);
        metrics.record_store_error();
        metrics.record_serialization_error();
        metrics.record_computation();
        metrics.record_coalesced_wait();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.deletes, 4);
        assert_eq!(snapshot.store_errors, 1);
        assert_eq!(snapshot.serialization_errors, 1);
        assert_eq!(snapshot.computations, 1);
        assert_eq!(snapshot.coalesced_waits, 1);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(CacheMetrics::new().snapshot()).unwrap();
        assert_eq!(json["hits"], 0);
    }
}
