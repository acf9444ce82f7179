//! In-process counter sink.
//!
//! [`CounterMetrics`] keeps one set of relaxed atomic counters per bucket
//! label. Recording a sample takes a shared lock on the label map only; the
//! exclusive lock is needed once per new label.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::metrics::snapshot::{BucketMetricsSnapshot, CacheMetricsSnapshot};
use crate::metrics::traits::{MetricsReset, MetricsSnapshotProvider, MetricsWriter};

/// Atomic counters for a single bucket.
#[derive(Debug, Default)]
struct BucketCounters {
    sets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expires: AtomicU64,
    deletes: AtomicU64,
    overflows: AtomicU64,
    evictions: AtomicU64,
    dumps: AtomicU64,
    loads: AtomicU64,
    set_nanos: AtomicU64,
    hit_nanos: AtomicU64,
}

impl BucketCounters {
    /// Snapshot current counters.
    fn snapshot(&self) -> BucketMetricsSnapshot {
        BucketMetricsSnapshot {
            sets: self.sets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expires: self.expires.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            dumps: self.dumps.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            set_nanos: self.set_nanos.load(Ordering::Relaxed),
            hit_nanos: self.hit_nanos.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn add_latency(counter: &AtomicU64, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        counter.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Metrics sink with per-bucket atomic counters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ttlkit::metrics::{CounterMetrics, MetricsWriter};
///
/// let metrics = CounterMetrics::new();
/// metrics.hit("0", Duration::from_nanos(40));
/// metrics.miss("1");
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.bucket("0").hits, 1);
/// assert_eq!(snapshot.total.lookups(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CounterMetrics {
    buckets: RwLock<FxHashMap<String, Arc<BucketCounters>>>,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, bucket: &str) -> Arc<BucketCounters> {
        if let Some(counters) = self.buckets.read().get(bucket) {
            return Arc::clone(counters);
        }
        let mut buckets = self.buckets.write();
        Arc::clone(buckets.entry(bucket.to_string()).or_default())
    }

    /// Captures every bucket's counters plus their sum.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let buckets: BTreeMap<String, BucketMetricsSnapshot> = self
            .buckets
            .read()
            .iter()
            .map(|(label, counters)| (label.clone(), counters.snapshot()))
            .collect();
        let mut total = BucketMetricsSnapshot::default();
        for snapshot in buckets.values() {
            total.accumulate(snapshot);
        }
        CacheMetricsSnapshot { buckets, total }
    }
}

impl MetricsWriter for CounterMetrics {
    fn set(&self, bucket: &str, latency: Duration) {
        let counters = self.counters(bucket);
        BucketCounters::incr(&counters.sets);
        BucketCounters::add_latency(&counters.set_nanos, latency);
    }

    fn hit(&self, bucket: &str, latency: Duration) {
        let counters = self.counters(bucket);
        BucketCounters::incr(&counters.hits);
        BucketCounters::add_latency(&counters.hit_nanos, latency);
    }

    fn del(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).deletes);
    }

    fn miss(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).misses);
    }

    fn expire(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).expires);
    }

    fn overflow(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).overflows);
    }

    fn evict(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).evictions);
    }

    fn dump(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).dumps);
    }

    fn load(&self, bucket: &str) {
        BucketCounters::incr(&self.counters(bucket).loads);
    }
}

impl MetricsSnapshotProvider<CacheMetricsSnapshot> for CounterMetrics {
    fn snapshot(&self) -> CacheMetricsSnapshot {
        CounterMetrics::snapshot(self)
    }
}

impl MetricsReset for CounterMetrics {
    fn reset_metrics(&self) {
        self.buckets.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_kept_per_bucket() {
        let metrics = CounterMetrics::new();
        metrics.set("0", Duration::from_nanos(10));
        metrics.set("0", Duration::from_nanos(15));
        metrics.set("1", Duration::from_nanos(5));
        metrics.evict("1");
        metrics.dump("1");
        metrics.load("2");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bucket("0").sets, 2);
        assert_eq!(snapshot.bucket("0").set_nanos, 25);
        assert_eq!(snapshot.bucket("1").evictions, 1);
        assert_eq!(snapshot.bucket("1").dumps, 1);
        assert_eq!(snapshot.bucket("2").loads, 1);
        assert_eq!(snapshot.bucket("missing"), BucketMetricsSnapshot::default());
        assert_eq!(snapshot.total.sets, 3);
        assert_eq!(snapshot.buckets.len(), 3);
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = CounterMetrics::new();
        metrics.miss("0");
        metrics.reset_metrics();
        assert_eq!(metrics.snapshot(), CacheMetricsSnapshot::default());
    }

    #[test]
    fn concurrent_recording_is_lossless() {
        let metrics = Arc::new(CounterMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    let label = (t % 2).to_string();
                    for _ in 0..1000 {
                        metrics.hit(&label, Duration::ZERO);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().total.hits, 8000);
    }
}
