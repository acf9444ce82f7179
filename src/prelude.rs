pub use crate::builder::CacheBuilder;
pub use crate::cache::{Cache, CacheStatus};
pub use crate::clock::{Clock, NativeClock, TestClock};
pub use crate::config::Config;
pub use crate::dump::{DumpEntry, DumpReader, DumpWriter, FileReader, FileWriter};
#[cfg(feature = "bincode")]
pub use crate::endec::BincodeEndec;
#[cfg(feature = "json")]
pub use crate::endec::JsonEndec;
pub use crate::endec::{Decoder, Encoder, MessageEndec};
pub use crate::error::{CacheError, ConfigError, DumpError, EndecError};
pub use crate::hasher::{FxKeyHasher, KeyHasher, SipKeyHasher};
pub use crate::logger::{Logger, TracingLogger};
#[cfg(feature = "metrics")]
pub use crate::metrics::{CacheMetricsSnapshot, CounterMetrics};
pub use crate::metrics::{MetricsWriter, NoopMetrics};
