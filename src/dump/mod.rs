//! Dump transport: streaming snapshots of cache entries to durable storage.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐  DumpEntry   ┌──────────────┐  frames   ┌───────────────┐
//!   │ Bucket::dump │ ───────────► │  DumpWriter  │ ────────► │ <name>.tmp    │
//!   └──────────────┘              │ (FileWriter) │  flush()  │   rename ──►  │
//!                                 └──────────────┘           │ <name>        │
//!                                                            └───────┬───────┘
//!   ┌──────────────┐  DumpEntry   ┌──────────────┐  frames           │
//!   │ Cache replay │ ◄─────────── │  DumpReader  │ ◄─────────────────┘
//!   └──────────────┘              │ (FileReader) │  on_eof(path)
//!                                 └──────────────┘
//! ```
//!
//! A dump is only visible under its final name once [`DumpWriter::flush`]
//! has renamed the temporary file, so readers never observe a partial dump.
//!
//! The wire layout lives in [`frame`]; the traits below are the seam for
//! alternative transports (network, object storage, in-memory).

pub mod file_reader;
pub mod file_writer;
pub mod frame;

pub use file_reader::{FileReader, OnEof, keep_file};
pub use file_writer::FileWriter;
pub use frame::{DUMP_FORMAT_VERSION, DEFAULT_MAX_BODY};

use crate::error::DumpError;

/// Expiry value meaning "never expires".
pub const NEVER_EXPIRES: u32 = u32::MAX;

/// One serialized cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    /// Routing hash of the original key.
    pub key: u64,
    /// Encoded payload.
    pub body: Vec<u8>,
    /// Expiry as unix seconds, or [`NEVER_EXPIRES`].
    pub expire: u32,
}

/// Sink for dumped entries.
///
/// Shared by all dump workers, so implementations synchronize internally.
pub trait DumpWriter: Send + Sync {
    /// Queues one entry, returning the number of framed bytes it occupies.
    fn write(&self, entry: &DumpEntry) -> Result<usize, DumpError>;

    /// Publishes everything written since the previous flush.
    fn flush(&self) -> Result<(), DumpError>;
}

/// Source of entries to restore.
pub trait DumpReader: Send + Sync {
    /// Returns the next entry, or `Ok(None)` once every source is consumed.
    fn read(&self) -> Result<Option<DumpEntry>, DumpError>;
}

/// Converts an expiry in unix nanoseconds to the wire representation.
pub(crate) fn expire_to_secs(expire_nanos: i64) -> u32 {
    if expire_nanos == i64::MAX {
        return NEVER_EXPIRES;
    }
    let secs = expire_nanos.div_euclid(1_000_000_000);
    // u32::MAX itself is reserved for "never"
    u32::try_from(secs.max(0)).map_or(NEVER_EXPIRES - 1, |s| s.min(NEVER_EXPIRES - 1))
}

/// Converts a wire expiry back to unix nanoseconds.
pub(crate) fn expire_from_secs(expire: u32) -> i64 {
    if expire == NEVER_EXPIRES {
        return i64::MAX;
    }
    i64::from(expire) * 1_000_000_000
}
