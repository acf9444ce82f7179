//! Error types for the ttlkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when the cache configuration is invalid
//!   (missing hasher, zero buckets, sub-second TTL, ...). Cached by the
//!   cache and returned on every call after a failed initialization.
//! - [`CacheError`]: Returned by every public cache operation. Lookup
//!   outcomes ([`CacheError::NotFound`], [`CacheError::Expired`]) are
//!   ordinary variants callers are expected to branch on.
//! - [`DumpError`]: Returned by the dump transport (file writer/reader and
//!   the wire framing).
//! - [`EndecError`]: Returned by payload encoders/decoders.
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (debug-oriented `check_invariants` methods).
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use ttlkit::error::{CacheError, ConfigError};
//! use ttlkit::{Cache, Config, FxKeyHasher};
//!
//! let config = Config::<String> {
//!     buckets: 4,
//!     hasher: Some(std::sync::Arc::new(FxKeyHasher)),
//!     ttl: Duration::from_millis(10),
//!     ..Config::default()
//! };
//! let err = Cache::new(config).unwrap_err();
//! assert!(matches!(
//!     err,
//!     CacheError::Config(ConfigError::TtlTooShort(_))
//! ));
//! ```

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Boxed source error carried by encoder/decoder failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal bucket invariants are violated.
///
/// Produced by [`Bucket::check_invariants`](crate::store::Bucket::check_invariants).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Configuration errors are fatal: the cache never leaves the
/// `Uninitialized` state and returns the same error on every call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No [`KeyHasher`](crate::hasher::KeyHasher) was supplied.
    #[error("no hasher provided")]
    NoHasher,
    /// The bucket count was zero.
    #[error("buckets must be greater than zero")]
    NoBuckets,
    /// A non-zero TTL below one second was configured.
    #[error("TTL must be at least one second, got {0:?}")]
    TtlTooShort(Duration),
    /// A dump writer was configured without a payload encoder.
    #[error("dump writer configured without an encoder")]
    NoEncoder,
    /// A dump reader was configured without a payload decoder.
    #[error("dump reader configured without a decoder")]
    NoDecoder,
}

// ---------------------------------------------------------------------------
// EndecError
// ---------------------------------------------------------------------------

/// Error returned by payload encoders and decoders.
///
/// [`EndecError::Unsupported`] is kept apart from the generic encode/decode
/// failures so a misconfigured encoder can be told apart from corrupt input.
#[derive(Debug, thiserror::Error)]
pub enum EndecError {
    /// The payload has a shape the encoder cannot represent.
    #[error("payload not supported by encoder: {0}")]
    Unsupported(String),
    /// Encoding failed.
    #[error("failed to encode payload")]
    Encode(#[source] BoxError),
    /// Decoding failed.
    #[error("failed to decode payload")]
    Decode(#[source] BoxError),
}

// ---------------------------------------------------------------------------
// DumpError
// ---------------------------------------------------------------------------

/// Error returned by the dump transport.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// The writer or reader was created with an empty path.
    #[error("no file path provided")]
    NoFilePath,
    /// The target directory is missing or read-only.
    #[error("directory {} does not exist or is not writable", .0.display())]
    DirNotWritable(PathBuf),
    /// The file name pattern contains an invalid strftime specifier.
    #[error("invalid file name pattern {0:?}")]
    BadPattern(String),
    /// The stream starts with a format version this build cannot read.
    #[error("unsupported dump format version {0}")]
    UnsupportedVersion(u32),
    /// The stream ended in the middle of a record.
    #[error("truncated dump record")]
    Truncated,
    /// A record declares a body larger than the reader accepts.
    #[error("dump record body of {len} bytes exceeds limit of {max} bytes")]
    BodyTooLarge { len: usize, max: usize },
    /// Underlying I/O failure.
    #[error("dump I/O failed: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by [`Cache`](crate::cache::Cache) operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Initialization failed; the error is cached and returned on every call.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The cache has not finished initializing.
    #[error("cache uninitialized")]
    Uninitialized,
    /// The cache was closed.
    #[error("cache closed")]
    Closed,
    /// No entry is stored under the key.
    #[error("entry not found")]
    NotFound,
    /// The entry exists but its TTL has elapsed.
    #[error("entry expired")]
    Expired,
    /// Payload encoding or decoding failed.
    #[error(transparent)]
    Endec(#[from] EndecError),
    /// Dump transport failed.
    #[error(transparent)]
    Dump(#[from] DumpError),
}

impl CacheError {
    /// Returns `true` for the ordinary lookup outcomes `NotFound` and `Expired`.
    #[inline]
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, CacheError::NotFound | CacheError::Expired)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("index points past dense array");
        assert_eq!(err.to_string(), "index points past dense array");
    }

    #[test]
    fn invariant_message_accessor() {
        let err = InvariantError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn invariant_clone_and_eq() {
        let a = InvariantError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_messages() {
        assert_eq!(ConfigError::NoHasher.to_string(), "no hasher provided");
        assert_eq!(
            ConfigError::NoBuckets.to_string(),
            "buckets must be greater than zero"
        );
        let short = ConfigError::TtlTooShort(Duration::from_millis(500));
        assert!(short.to_string().contains("500ms"));
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<ConfigError>();
    }

    // -- CacheError -------------------------------------------------------

    #[test]
    fn cache_error_wraps_config_transparently() {
        let err = CacheError::from(ConfigError::NoHasher);
        assert_eq!(err.to_string(), "no hasher provided");
    }

    #[test]
    fn lookup_miss_covers_not_found_and_expired_only() {
        assert!(CacheError::NotFound.is_lookup_miss());
        assert!(CacheError::Expired.is_lookup_miss());
        assert!(!CacheError::Closed.is_lookup_miss());
        assert!(!CacheError::Uninitialized.is_lookup_miss());
    }

    // -- DumpError --------------------------------------------------------

    #[test]
    fn dump_error_from_io_keeps_kind() {
        let err = DumpError::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        match err {
            DumpError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn dump_error_body_too_large_message() {
        let err = DumpError::BodyTooLarge { len: 10, max: 4 };
        assert_eq!(
            err.to_string(),
            "dump record body of 10 bytes exceeds limit of 4 bytes"
        );
    }

    #[test]
    fn endec_unsupported_is_distinct_from_io() {
        let err = CacheError::from(EndecError::Unsupported("map key".into()));
        assert!(matches!(err, CacheError::Endec(EndecError::Unsupported(_))));
    }
}
