use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::{BucketMetricsSnapshot, CacheMetricsSnapshot};
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache metrics snapshots.
///
/// Writes the Prometheus text exposition format so the output can be scraped
/// by Prometheus or forwarded to an OpenTelemetry collector. Each counter is
/// emitted once per bucket with a `bucket` label; `op` distinguishes the
/// operation inside the shared `io_total` family.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ttlkit::metrics::{CounterMetrics, MetricsExporter, MetricsWriter, PrometheusTextExporter};
///
/// let metrics = CounterMetrics::new();
/// metrics.set("0", Duration::from_micros(3));
///
/// let exporter = PrometheusTextExporter::new("ttlkit", Vec::new());
/// exporter.export(&metrics.snapshot());
/// let text = String::from_utf8(exporter.into_inner()).unwrap();
/// assert!(text.contains(r#"ttlkit_io_total{bucket="0",op="set"} 1"#));
/// ```
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }

    fn write_family(
        &self,
        writer: &mut W,
        name: &str,
        kind: &str,
        help: &str,
        samples: &[(String, u64)],
    ) {
        let _ = writeln!(writer, "# HELP {} {}", name, help);
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        for (labels, value) in samples {
            let _ = writeln!(writer, "{}{{{}}} {}", name, labels, value);
        }
    }
}

fn io_samples(label: &str, snapshot: &BucketMetricsSnapshot, out: &mut Vec<(String, u64)>) {
    let ops = [
        ("set", snapshot.sets),
        ("hit", snapshot.hits),
        ("miss", snapshot.misses),
        ("expire", snapshot.expires),
        ("del", snapshot.deletes),
        ("overflow", snapshot.overflows),
        ("evict", snapshot.evictions),
    ];
    for (op, value) in ops {
        out.push((format!("bucket=\"{}\",op=\"{}\"", label, op), value));
    }
}

impl<W: Write + Send> MetricsExporter<CacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheMetricsSnapshot) {
        let mut io = Vec::new();
        let mut dump = Vec::new();
        let mut latency = Vec::new();
        for (label, bucket) in &snapshot.buckets {
            io_samples(label, bucket, &mut io);
            dump.push((format!("bucket=\"{}\",op=\"dump\"", label), bucket.dumps));
            dump.push((format!("bucket=\"{}\",op=\"load\"", label), bucket.loads));
            latency.push((format!("bucket=\"{}\",op=\"write\"", label), bucket.set_nanos));
            latency.push((format!("bucket=\"{}\",op=\"read\"", label), bucket.hit_nanos));
        }

        let mut writer = self.writer.lock();
        self.write_family(
            &mut writer,
            &self.metric_name("io_total"),
            "counter",
            "Cache IO operations per bucket.",
            &io,
        );
        self.write_family(
            &mut writer,
            &self.metric_name("dump_total"),
            "counter",
            "Dump and restore operations per bucket.",
            &dump,
        );
        self.write_family(
            &mut writer,
            &self.metric_name("io_latency_nanoseconds_total"),
            "counter",
            "Cumulative latency of set (write) and hit (read) operations.",
            &latency,
        );
        let _ = writer.flush();
    }
}
