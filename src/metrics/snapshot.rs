use std::collections::BTreeMap;

/// Counters for one bucket, captured at snapshot time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BucketMetricsSnapshot {
    pub sets: u64,
    pub hits: u64,
    pub misses: u64,
    pub expires: u64,
    pub deletes: u64,
    pub overflows: u64,
    pub evictions: u64,
    pub dumps: u64,
    pub loads: u64,

    // cumulative latency reported with set/hit samples
    pub set_nanos: u64,
    pub hit_nanos: u64,
}

impl BucketMetricsSnapshot {
    /// Adds another bucket's counters into this one.
    pub fn accumulate(&mut self, other: &BucketMetricsSnapshot) {
        self.sets += other.sets;
        self.hits += other.hits;
        self.misses += other.misses;
        self.expires += other.expires;
        self.deletes += other.deletes;
        self.overflows += other.overflows;
        self.evictions += other.evictions;
        self.dumps += other.dumps;
        self.loads += other.loads;
        self.set_nanos += other.set_nanos;
        self.hit_nanos += other.hit_nanos;
    }

    /// Number of lookups (hits, misses and expired hits).
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.expires
    }

    /// Fraction of lookups that returned a value, `0.0` with no lookups.
    pub fn hit_ratio(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

/// Snapshot of a whole cache, keyed by bucket label.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub buckets: BTreeMap<String, BucketMetricsSnapshot>,
    pub total: BucketMetricsSnapshot,
}

impl CacheMetricsSnapshot {
    /// Returns the counters for `bucket`, zeroed if it never reported.
    pub fn bucket(&self, bucket: &str) -> BucketMetricsSnapshot {
        self.buckets.get(bucket).copied().unwrap_or_default()
    }
}
