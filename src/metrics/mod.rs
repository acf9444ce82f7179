//! Metrics sinks for bucket operations.
//!
//! The [`MetricsWriter`] contract and the default [`NoopMetrics`] are always
//! compiled in. The counter sink, snapshots and the Prometheus text exporter
//! live behind the `metrics` feature.

#[cfg(feature = "metrics")]
pub mod counters;
#[cfg(feature = "metrics")]
pub mod exporter;
#[cfg(feature = "metrics")]
pub mod snapshot;
pub mod traits;

#[cfg(feature = "metrics")]
pub use counters::CounterMetrics;
#[cfg(feature = "metrics")]
pub use exporter::PrometheusTextExporter;
#[cfg(feature = "metrics")]
pub use snapshot::{BucketMetricsSnapshot, CacheMetricsSnapshot};
pub use traits::{MetricsExporter, MetricsReset, MetricsSnapshotProvider, MetricsWriter, NoopMetrics};
