//! Instrumentation hooks for filter operations
//!
//! `Filter` reports every insert, delete, lookup and merge to a
//! [`MetricsRecorder`]. [`Metrics`] keeps lock-free totals in process;
//! implement the trait yourself to forward to an external metrics system.
//!
//! ```
//! use std::time::Duration;
//! use counting_bloom::metrics::Metrics;
//!
//! let metrics = Metrics::new();
//! metrics.record_filter_created(1000, 4, 375);
//! metrics.record_lookup(Duration::from_nanos(80), true);
//!
//! assert_eq!(metrics.snapshot().lookups_positive, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Call count and cumulative latency of one operation kind
#[derive(Debug, Default)]
pub struct Operation {
    calls: AtomicU64,
    total_ns: AtomicU64,
}

impl Operation {
    fn record(&self, duration: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Number of recorded calls
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Mean latency in nanoseconds, 0 before the first call
    pub fn mean_ns(&self) -> u64 {
        self.total_ns
            .load(Ordering::Relaxed)
            .checked_div(self.calls())
            .unwrap_or(0)
    }

    fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.total_ns.store(0, Ordering::Relaxed);
    }
}

/// In-process metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    pub inserts: Operation,
    pub deletes: Operation,
    pub lookups: Operation,
    /// Lookups that answered "maybe present"
    pub lookups_positive: AtomicU64,
    pub filters_created: AtomicU64,
    pub filters_merged: AtomicU64,
    /// Bytes of bucket storage held in process memory
    pub bytes_allocated: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record filter creation
    ///
    /// # Arguments
    /// * `size` - Number of buckets (m)
    /// * `hash_count` - Number of hash rounds (k)
    /// * `local_bytes` - Bucket bytes held locally (0 for store-backed filters)
    pub fn record_filter_created(&self, _size: usize, _hash_count: usize, local_bytes: usize) {
        self.filters_created.fetch_add(1, Ordering::Relaxed);
        self.bytes_allocated
            .fetch_add(local_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_insert(&self, duration: Duration) {
        self.inserts.record(duration);
    }

    pub fn record_delete(&self, duration: Duration) {
        self.deletes.record(duration);
    }

    /// `found` may be a false positive.
    pub fn record_lookup(&self, duration: Duration, found: bool) {
        self.lookups.record(duration);
        if found {
            self.lookups_positive.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_merge(&self) {
        self.filters_merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current totals
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            filters_created: self.filters_created.load(Ordering::Relaxed),
            keys_inserted: self.inserts.calls(),
            keys_deleted: self.deletes.calls(),
            lookups_performed: self.lookups.calls(),
            lookups_positive: self.lookups_positive.load(Ordering::Relaxed),
            filters_merged: self.filters_merged.load(Ordering::Relaxed),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
            avg_insert_ns: self.inserts.mean_ns(),
            avg_delete_ns: self.deletes.mean_ns(),
            avg_lookup_ns: self.lookups.mean_ns(),
        }
    }

    /// Share of lookups that answered "maybe present", true and false
    /// positives alike.
    pub fn observed_positive_rate(&self) -> f64 {
        match self.lookups.calls() {
            0 => 0.0,
            total => self.lookups_positive.load(Ordering::Relaxed) as f64 / total as f64,
        }
    }

    /// Zero every total
    pub fn reset(&self) {
        self.inserts.reset();
        self.deletes.reset();
        self.lookups.reset();
        for counter in [
            &self.lookups_positive,
            &self.filters_created,
            &self.filters_merged,
            &self.bytes_allocated,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub filters_created: u64,
    pub keys_inserted: u64,
    pub keys_deleted: u64,
    pub lookups_performed: u64,
    pub lookups_positive: u64,
    pub filters_merged: u64,
    pub bytes_allocated: u64,
    pub avg_insert_ns: u64,
    pub avg_delete_ns: u64,
    pub avg_lookup_ns: u64,
}

/// Sink for filter instrumentation
///
/// Implement this trait to integrate with external metrics systems
/// like Prometheus, StatsD, or OpenTelemetry.
pub trait MetricsRecorder: Send + Sync {
    fn record_filter_created(&self, size: usize, hash_count: usize, local_bytes: usize);

    fn record_insert(&self, duration: Duration);

    fn record_delete(&self, duration: Duration);

    /// `found` is the answer the caller got back.
    fn record_lookup(&self, duration: Duration, found: bool);

    fn record_merge(&self);
}

/// Recorder that drops everything
#[derive(Debug, Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_filter_created(&self, _: usize, _: usize, _: usize) {}
    fn record_insert(&self, _: Duration) {}
    fn record_delete(&self, _: Duration) {}
    fn record_lookup(&self, _: Duration, _: bool) {}
    fn record_merge(&self) {}
}

impl MetricsRecorder for Metrics {
    fn record_filter_created(&self, size: usize, hash_count: usize, local_bytes: usize) {
        Metrics::record_filter_created(self, size, hash_count, local_bytes);
    }

    fn record_insert(&self, duration: Duration) {
        Metrics::record_insert(self, duration);
    }

    fn record_delete(&self, duration: Duration) {
        Metrics::record_delete(self, duration);
    }

    fn record_lookup(&self, duration: Duration, found: bool) {
        Metrics::record_lookup(self, duration, found);
    }

    fn record_merge(&self) {
        Metrics::record_merge(self);
    }
}
