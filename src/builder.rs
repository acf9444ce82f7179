//! Fluent cache construction.
//!
//! [`CacheBuilder`] is a thin layer over [`Config`]: every setter fills one
//! field, and [`build`](CacheBuilder::build) hands the result to
//! [`Cache::new`].
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use ttlkit::{CacheBuilder, FxKeyHasher};
//!
//! let cache = CacheBuilder::<u64>::new(16)
//!     .hasher(FxKeyHasher)
//!     .ttl(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! cache.set("answer", 42).unwrap();
//! assert_eq!(cache.get("answer").unwrap(), 42);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::clock::Clock;
use crate::config::Config;
use crate::dump::{DumpReader, DumpWriter};
use crate::endec::{Decoder, Encoder};
use crate::error::CacheError;
use crate::hasher::KeyHasher;
use crate::logger::Logger;
use crate::metrics::MetricsWriter;

/// Builder for [`Cache`].
#[derive(Debug)]
pub struct CacheBuilder<T> {
    config: Config<T>,
}

impl<T> CacheBuilder<T> {
    /// Starts a builder for a cache with `buckets` shards.
    pub fn new(buckets: usize) -> Self {
        Self {
            config: Config {
                buckets,
                ..Config::default()
            },
        }
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: Config<T>) -> Self {
        Self { config }
    }

    pub fn hasher(mut self, hasher: impl KeyHasher + 'static) -> Self {
        self.config.hasher = Some(Arc::new(hasher));
        self
    }

    /// Entry time-to-live. `Duration::ZERO` disables expiry.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn evict_interval(mut self, interval: Duration) -> Self {
        self.config.evict_interval = interval;
        self
    }

    pub fn evict_workers(mut self, workers: usize) -> Self {
        self.config.evict_workers = workers;
        self
    }

    /// Enables dumps: `encoder` serializes payloads into `writer`.
    pub fn dump_to(
        mut self,
        writer: impl DumpWriter + 'static,
        encoder: impl Encoder<T> + 'static,
    ) -> Self {
        self.config.dump_writer = Some(Arc::new(writer));
        self.config.encoder = Some(Arc::new(encoder));
        self
    }

    /// Dumps automatically every `interval`.
    pub fn dump_interval(mut self, interval: Duration) -> Self {
        self.config.dump_interval = interval;
        self
    }

    pub fn dump_workers(mut self, workers: usize) -> Self {
        self.config.dump_workers = workers;
        self
    }

    /// Replays `reader` into the cache during initialization.
    pub fn restore_from(
        mut self,
        reader: impl DumpReader + 'static,
        decoder: impl Decoder<T> + 'static,
    ) -> Self {
        self.config.dump_reader = Some(Arc::new(reader));
        self.config.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn dump_read_buffer(mut self, records: usize) -> Self {
        self.config.dump_read_buffer = records;
        self
    }

    pub fn dump_read_workers(mut self, workers: usize) -> Self {
        self.config.dump_read_workers = workers;
        self
    }

    /// Replays in the background instead of blocking initialization.
    pub fn dump_read_async(mut self, run_async: bool) -> Self {
        self.config.dump_read_async = run_async;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsWriter>) -> Self {
        self.config.metrics_writer = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = Some(clock);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.config.logger = Some(logger);
        self
    }

    /// Returns the accumulated configuration.
    pub fn into_config(self) -> Config<T> {
        self.config
    }
}

impl<T> CacheBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds and initializes the cache.
    pub fn build(self) -> Result<Cache<T>, CacheError> {
        Cache::new(self.config)
    }

    /// Builds a cache that initializes on first use.
    pub fn build_lazy(self) -> Cache<T> {
        Cache::lazy(self.config)
    }
}
