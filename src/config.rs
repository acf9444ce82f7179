//! Cache configuration.
//!
//! [`Config`] is a plain struct with public fields; unset optional fields are
//! filled with defaults when the cache initializes. The cache keeps its own
//! copy, so changing a `Config` after handing it over has no effect.
//!
//! | Field               | Required | Default                           |
//! |---------------------|----------|-----------------------------------|
//! | `buckets`           | yes      | `0` (rejected)                    |
//! | `hasher`            | yes      | `None` (rejected)                 |
//! | `ttl`               | no       | `0`, entries never expire         |
//! | `evict_interval`    | no       | `ttl / 2`                         |
//! | `evict_workers`     | no       | [`DEFAULT_WORKERS`]               |
//! | `encoder`           | with `dump_writer` | none                    |
//! | `decoder`           | with `dump_reader` | none                    |
//! | `dump_writer`       | no       | dumps disabled                    |
//! | `dump_interval`     | no       | `0`, on-demand [`Cache::dump`] only |
//! | `dump_workers`      | no       | [`DEFAULT_WORKERS`]               |
//! | `dump_reader`       | no       | no replay at startup              |
//! | `dump_read_buffer`  | no       | [`DEFAULT_READ_BUFFER`] records   |
//! | `dump_read_workers` | no       | [`DEFAULT_WORKERS`]               |
//! | `dump_read_async`   | no       | `false`                           |
//! | `metrics_writer`    | no       | [`NoopMetrics`]                   |
//! | `clock`             | no       | [`NativeClock`]                   |
//! | `logger`            | no       | failures logged through `tracing` |
//!
//! [`Cache::dump`]: crate::cache::Cache::dump

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, NativeClock};
use crate::dump::{DumpReader, DumpWriter};
use crate::endec::{Decoder, Encoder};
use crate::error::ConfigError;
use crate::hasher::KeyHasher;
use crate::logger::Logger;
use crate::metrics::{MetricsWriter, NoopMetrics};

/// Worker count used by bulk operations when none is configured.
pub const DEFAULT_WORKERS: usize = 16;

/// Records buffered between the dump reader and the restore workers.
pub const DEFAULT_READ_BUFFER: usize = 64;

/// Shortest non-zero TTL accepted.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Cache configuration. See the [module docs](self) for defaults.
pub struct Config<T> {
    pub buckets: usize,
    pub hasher: Option<Arc<dyn KeyHasher>>,
    pub ttl: Duration,
    pub evict_interval: Duration,
    pub evict_workers: usize,
    pub encoder: Option<Arc<dyn Encoder<T>>>,
    pub decoder: Option<Arc<dyn Decoder<T>>>,
    pub dump_writer: Option<Arc<dyn DumpWriter>>,
    pub dump_interval: Duration,
    pub dump_workers: usize,
    pub dump_reader: Option<Arc<dyn DumpReader>>,
    pub dump_read_buffer: usize,
    pub dump_read_workers: usize,
    pub dump_read_async: bool,
    pub metrics_writer: Option<Arc<dyn MetricsWriter>>,
    pub clock: Option<Arc<dyn Clock>>,
    pub logger: Option<Arc<dyn Logger>>,
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Self {
            buckets: 0,
            hasher: None,
            ttl: Duration::ZERO,
            evict_interval: Duration::ZERO,
            evict_workers: 0,
            encoder: None,
            decoder: None,
            dump_writer: None,
            dump_interval: Duration::ZERO,
            dump_workers: 0,
            dump_reader: None,
            dump_read_buffer: 0,
            dump_read_workers: 0,
            dump_read_async: false,
            metrics_writer: None,
            clock: None,
            logger: None,
        }
    }
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            hasher: self.hasher.clone(),
            ttl: self.ttl,
            evict_interval: self.evict_interval,
            evict_workers: self.evict_workers,
            encoder: self.encoder.clone(),
            decoder: self.decoder.clone(),
            dump_writer: self.dump_writer.clone(),
            dump_interval: self.dump_interval,
            dump_workers: self.dump_workers,
            dump_reader: self.dump_reader.clone(),
            dump_read_buffer: self.dump_read_buffer,
            dump_read_workers: self.dump_read_workers,
            dump_read_async: self.dump_read_async,
            metrics_writer: self.metrics_writer.clone(),
            clock: self.clock.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("buckets", &self.buckets)
            .field("hasher", &self.hasher.is_some())
            .field("ttl", &self.ttl)
            .field("evict_interval", &self.evict_interval)
            .field("evict_workers", &self.evict_workers)
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("dump_writer", &self.dump_writer.is_some())
            .field("dump_interval", &self.dump_interval)
            .field("dump_workers", &self.dump_workers)
            .field("dump_reader", &self.dump_reader.is_some())
            .field("dump_read_buffer", &self.dump_read_buffer)
            .field("dump_read_workers", &self.dump_read_workers)
            .field("dump_read_async", &self.dump_read_async)
            .field("metrics_writer", &self.metrics_writer.is_some())
            .field("clock", &self.clock.is_some())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl<T> Config<T> {
    /// Checks required fields and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hasher.is_none() {
            return Err(ConfigError::NoHasher);
        }
        if self.buckets == 0 {
            return Err(ConfigError::NoBuckets);
        }
        if !self.ttl.is_zero() && self.ttl < MIN_TTL {
            return Err(ConfigError::TtlTooShort(self.ttl));
        }
        if self.dump_writer.is_some() && self.encoder.is_none() {
            return Err(ConfigError::NoEncoder);
        }
        if self.dump_reader.is_some() && self.decoder.is_none() {
            return Err(ConfigError::NoDecoder);
        }
        Ok(())
    }

    /// Validates and fills in defaults.
    pub(crate) fn resolve(&self) -> Result<Settings<T>, ConfigError> {
        self.validate()?;
        let Some(hasher) = self.hasher.clone() else {
            return Err(ConfigError::NoHasher);
        };

        let evict_interval = match self.evict_interval {
            d if d.is_zero() => self.ttl / 2,
            d => d,
        };

        let dump = match (&self.dump_writer, &self.encoder) {
            (Some(writer), Some(encoder)) => Some(DumpSettings {
                encoder: Arc::clone(encoder),
                writer: Arc::clone(writer),
                interval: self.dump_interval,
                workers: or_default(self.dump_workers, DEFAULT_WORKERS),
            }),
            _ => None,
        };

        let restore = match (&self.dump_reader, &self.decoder) {
            (Some(reader), Some(decoder)) => Some(RestoreSettings {
                decoder: Arc::clone(decoder),
                reader: Arc::clone(reader),
                buffer: or_default(self.dump_read_buffer, DEFAULT_READ_BUFFER),
                workers: or_default(self.dump_read_workers, DEFAULT_WORKERS),
                run_async: self.dump_read_async,
            }),
            _ => None,
        };

        Ok(Settings {
            buckets: self.buckets,
            hasher,
            ttl: self.ttl,
            evict_interval,
            evict_workers: or_default(self.evict_workers, DEFAULT_WORKERS),
            dump,
            restore,
            metrics: self
                .metrics_writer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopMetrics)),
            clock: self
                .clock
                .clone()
                .unwrap_or_else(|| Arc::new(NativeClock::new())),
            logger: self.logger.clone(),
        })
    }
}

fn or_default(value: usize, default: usize) -> usize {
    if value == 0 { default } else { value }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

pub(crate) struct DumpSettings<T> {
    pub(crate) encoder: Arc<dyn Encoder<T>>,
    pub(crate) writer: Arc<dyn DumpWriter>,
    pub(crate) interval: Duration,
    pub(crate) workers: usize,
}

pub(crate) struct RestoreSettings<T> {
    pub(crate) decoder: Arc<dyn Decoder<T>>,
    pub(crate) reader: Arc<dyn DumpReader>,
    pub(crate) buffer: usize,
    pub(crate) workers: usize,
    pub(crate) run_async: bool,
}

/// Validated configuration with every default applied.
pub(crate) struct Settings<T> {
    pub(crate) buckets: usize,
    pub(crate) hasher: Arc<dyn KeyHasher>,
    pub(crate) ttl: Duration,
    pub(crate) evict_interval: Duration,
    pub(crate) evict_workers: usize,
    pub(crate) dump: Option<DumpSettings<T>>,
    pub(crate) restore: Option<RestoreSettings<T>>,
    pub(crate) metrics: Arc<dyn MetricsWriter>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endec::MessageEndec;
    use crate::hasher::FxKeyHasher;

    fn base() -> Config<Vec<u8>> {
        Config {
            buckets: 4,
            hasher: Some(Arc::new(FxKeyHasher)),
            ..Config::default()
        }
    }

    struct NullWriter;

    impl DumpWriter for NullWriter {
        fn write(&self, entry: &crate::dump::DumpEntry) -> Result<usize, crate::error::DumpError> {
            Ok(entry.body.len())
        }

        fn flush(&self) -> Result<(), crate::error::DumpError> {
            Ok(())
        }
    }

    #[test]
    fn required_fields_are_checked_in_order() {
        assert_eq!(Config::<Vec<u8>>::default().validate(), Err(ConfigError::NoHasher));
        let no_buckets = Config { buckets: 0, ..base() };
        assert_eq!(no_buckets.validate(), Err(ConfigError::NoBuckets));
        assert_eq!(base().validate(), Ok(()));
    }

    #[test]
    fn ttl_below_one_second_is_rejected() {
        let short = Config {
            ttl: Duration::from_millis(999),
            ..base()
        };
        assert_eq!(short.validate(), Err(ConfigError::TtlTooShort(Duration::from_millis(999))));
        let exact = Config { ttl: MIN_TTL, ..base() };
        assert_eq!(exact.validate(), Ok(()));
    }

    #[test]
    fn dump_writer_requires_encoder() {
        let mut config = Config {
            dump_writer: Some(Arc::new(NullWriter)),
            ..base()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoEncoder));
        config.encoder = Some(Arc::new(MessageEndec));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn defaults_are_resolved() {
        let config = Config {
            ttl: Duration::from_secs(10),
            ..base()
        };
        let settings = config.resolve().unwrap();
        assert_eq!(settings.evict_interval, Duration::from_secs(5));
        assert_eq!(settings.evict_workers, DEFAULT_WORKERS);
        assert!(settings.dump.is_none());
        assert!(settings.restore.is_none());
        assert!(settings.logger.is_none());
    }

    #[test]
    fn clone_shares_plugins() {
        let config = base();
        let copy = config.clone();
        let (a, b) = (config.hasher.unwrap(), copy.hasher.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(copy.buckets, 4);
    }
}
