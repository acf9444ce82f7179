//! Key hashing capability.
//!
//! A [`KeyHasher`] turns a key into the 64-bit *routing hash* used both to
//! pick a bucket and as the in-bucket lookup key. The store never sees the
//! original key, so two keys that hash identically are indistinguishable and
//! the later `set` overwrites the earlier one. Deployments must pick a hasher
//! whose collision rate is acceptable for their key space.
//!
//! The hasher must also be stable for as long as dump files are kept: a dump
//! record stores the routing hash, not the key, and replay routes by it.
//!
//! ## Implementations
//!
//! | Hasher          | Algorithm               | Stable across builds |
//! |-----------------|-------------------------|----------------------|
//! | `FxKeyHasher`   | rustc-hash `FxHasher`   | yes                  |
//! | `SipKeyHasher`  | std SipHash, seeded     | same toolchain only  |
//!
//! ## Example Usage
//!
//! ```
//! use ttlkit::hasher::{FxKeyHasher, KeyHasher};
//!
//! let hasher = FxKeyHasher;
//! assert_eq!(hasher.sum64(b"user:1"), hasher.sum64(b"user:1"));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Deterministic 64-bit hash over a key's bytes.
pub trait KeyHasher: Send + Sync {
    /// Hashes `key` into a routing hash.
    fn sum64(&self, key: &[u8]) -> u64;
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64 + Send + Sync,
{
    fn sum64(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// Fast non-cryptographic hasher backed by `rustc_hash::FxHasher`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FxKeyHasher;

impl KeyHasher for FxKeyHasher {
    #[inline]
    fn sum64(&self, key: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        hasher.finish()
    }
}

/// SipHash hasher with a seed mixed in before the key.
///
/// Different seeds produce different distributions. The std SipHash
/// implementation is not guaranteed stable across Rust releases, so dump
/// files written with this hasher should be replayed by the same build.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct SipKeyHasher {
    seed: u64,
}

impl SipKeyHasher {
    /// Creates a hasher with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl fmt::Debug for SipKeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SipKeyHasher").finish_non_exhaustive()
    }
}

impl KeyHasher for SipKeyHasher {
    fn sum64(&self, key: &[u8]) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        hasher.write(key);
        hasher.finish()
    }
}
