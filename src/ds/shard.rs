//! Shard routing for the bucket array.
//!
//! Maps a 64-bit routing hash to a bucket index. Routing is a pure function
//! of the hash and the shard count, so every key with the same hash lands in
//! the same bucket for the whole lifetime of a cache, and dump records (which
//! carry only the hash) are replayed into the bucket that wrote them as long
//! as the shard count is unchanged.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shard Selection Flow                            │
//! │                                                                         │
//! │   key bytes ──► KeyHasher::sum64 ──► routing hash (u64)                 │
//! │                                           │                             │
//! │                                           ▼                             │
//! │   ┌───────────────────────────────────────────────────────────────┐     │
//! │   │  ShardSelector { shards: 4 }                                  │     │
//! │   │                                                               │     │
//! │   │  shard = hash % 4                                             │     │
//! │   └───────────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ┌─────────┬─────────┬─────────┬─────────┐                             │
//! │   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │                             │
//! │   └─────────┴─────────┴─────────┴─────────┘                             │
//! │                                                                         │
//! │   The same hash is reused as the lookup key inside the bucket.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use ttlkit::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(4);
//! assert_eq!(selector.shard_for_hash(9), 1);
//! assert_eq!(selector.shard_for_hash(9), selector.shard_for_hash(9));
//! ```

/// Deterministic hash-to-shard mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards.
    ///
    /// The shard count is clamped to at least 1; the cache rejects a zero
    /// count during configuration validation before a selector is built.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlkit::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(16).shard_count(), 16);
    /// assert_eq!(ShardSelector::new(0).shard_count(), 1);
    /// ```
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
        }
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps a routing hash to a shard index in `[0, shards)`.
    #[inline]
    pub fn shard_for_hash(&self, hash: u64) -> usize {
        (hash % self.shards as u64) as usize
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector.
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_selector_is_deterministic() {
        let selector = ShardSelector::new(8);

        let a = selector.shard_for_hash(0xdead_beef);
        let b = selector.shard_for_hash(0xdead_beef);
        assert_eq!(a, b);
        assert!(a < selector.shard_count());
    }

    #[test]
    fn single_shard_routes_everything_to_zero() {
        let selector = ShardSelector::default();
        for hash in [0, 1, u64::MAX, 12345] {
            assert_eq!(selector.shard_for_hash(hash), 0);
        }
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Hashes congruent modulo the shard count route to the same shard.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_congruent_hashes_share_a_shard(
            shards in 1usize..128,
            hash in any::<u64>(),
            k in 0u64..1024
        ) {
            let selector = ShardSelector::new(shards);
            let step = shards as u64;
            let other = (hash % step).wrapping_add(k.wrapping_mul(step));
            prop_assert_eq!(selector.shard_for_hash(hash), selector.shard_for_hash(other));
        }

        /// Every hash maps into range.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_shard_in_range(shards in 1usize..1024, hash in any::<u64>()) {
            let selector = ShardSelector::new(shards);
            prop_assert!(selector.shard_for_hash(hash) < shards);
        }
    }
}
