//! # Metrics Trait Hierarchy
//!
//! Separates *recording*, *snapshotting* and *export* so the cache core only
//! depends on the recording side.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────────────────────────┐
//!                 │            MetricsWriter                │
//!                 │  set/hit(bucket, latency)               │
//!                 │  del/miss/expire/overflow/evict         │
//!                 │  dump/load                              │
//!                 └───────────────────┬─────────────────────┘
//!                                     │
//!                 ┌───────────────────┴─────────────────────┐
//!                 │                                         │
//!                 ▼                                         ▼
//!          ┌─────────────┐                          ┌───────────────┐
//!          │ NoopMetrics │                          │ CounterMetrics│
//!          │  (default)  │                          │ (feature      │
//!          └─────────────┘                          │  "metrics")   │
//!                                                   └───────┬───────┘
//!   Consumption (decoupled from recording):                 │
//!   ┌──────────────────────────────┐    ┌───────────────────▼──────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Every method receives the bucket label (the decimal bucket index), so a
//! sink can keep per-bucket series.

use std::time::Duration;

/// Per-bucket metrics sink consumed by the cache.
pub trait MetricsWriter: Send + Sync {
    /// An entry was inserted or updated; `latency` covers lock wait and write.
    fn set(&self, bucket: &str, latency: Duration);
    /// A lookup found a live entry; `latency` covers lock wait and read.
    fn hit(&self, bucket: &str, latency: Duration);
    /// An entry was removed by `delete` or `extract`.
    fn del(&self, bucket: &str);
    /// A lookup found nothing.
    fn miss(&self, bucket: &str);
    /// A lookup found an entry whose TTL has elapsed.
    fn expire(&self, bucket: &str);
    /// A size-bounded store rejected a write.
    fn overflow(&self, bucket: &str);
    /// An eviction sweep purged an entry.
    fn evict(&self, bucket: &str);
    /// An entry was written to the dump stream.
    fn dump(&self, bucket: &str);
    /// An entry was restored from a dump stream.
    fn load(&self, bucket: &str);
}

/// Sink that discards everything. Used when no metrics writer is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopMetrics;

impl MetricsWriter for NoopMetrics {
    #[inline]
    fn set(&self, _bucket: &str, _latency: Duration) {}
    #[inline]
    fn hit(&self, _bucket: &str, _latency: Duration) {}
    #[inline]
    fn del(&self, _bucket: &str) {}
    #[inline]
    fn miss(&self, _bucket: &str) {}
    #[inline]
    fn expire(&self, _bucket: &str) {}
    #[inline]
    fn overflow(&self, _bucket: &str) {}
    #[inline]
    fn evict(&self, _bucket: &str) {}
    #[inline]
    fn dump(&self, _bucket: &str) {}
    #[inline]
    fn load(&self, _bucket: &str) {}
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
