//! One shard of the cache keyspace.
//!
//! A bucket stores entries in a dense `Vec` and maps routing hashes to
//! positions with an index. Removal swaps the last entry into the vacated
//! slot, so every removal is O(1) and the array never has holes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       Bucket<T> (one shard)                          │
//! │                                                                      │
//! │   RwLock<Slots<T>>                                                   │
//! │   ┌──────────────────────────────┐   ┌─────────────────────────────┐ │
//! │   │ index: FxHashMap<u64, usize> │   │ entries: Vec<Entry<T>>      │ │
//! │   │                              │   │                             │ │
//! │   │   0xA1 ──► 0  ───────────────┼──►│ [0] { hash: 0xA1, .. }      │ │
//! │   │   0x7F ──► 1  ───────────────┼──►│ [1] { hash: 0x7F, .. }      │ │
//! │   │   0x33 ──► 2  ───────────────┼──►│ [2] { hash: 0x33, .. }      │ │
//! │   └──────────────────────────────┘   └─────────────────────────────┘ │
//! │                                                                      │
//! │   remove(0x7F):  entries.swap_remove(1)  → [0xA1, 0x33]              │
//! │                  index[0x33] = 1, index.remove(0x7F)                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! | Operation  | Lock      | Notes                                        |
//! |------------|-----------|----------------------------------------------|
//! | `set`      | exclusive | insert or overwrite, refreshes expiry        |
//! | `get`      | shared    | expired entries are reported, not removed    |
//! | `delete`   | exclusive | idempotent                                   |
//! | `extract`  | exclusive | get + delete under one lock                  |
//! | `evict`    | exclusive | single forward sweep                         |
//! | `dump`     | shared    | snapshot, never mutates                      |
//! | `reset`    | exclusive | keeps capacity                               |
//! | `close`    | exclusive | releases storage                             |
//!
//! ## Eviction sweep
//!
//! `evict` removes entries whose expiry lies more than one TTL in the past.
//! The sweep is a single forward pass: when slot `i` is removed, the last
//! entry moves into `i` and the pass continues at `i + 1`, so the moved entry
//! is not examined until the next sweep. Logically expired entries are never
//! returned by `get`/`extract` regardless, so the delay only affects memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::clock::{Clock, unix_nanos};
use crate::dump::{DumpEntry, DumpWriter, expire_to_secs};
use crate::endec::Encoder;
use crate::error::{CacheError, InvariantError};
use crate::metrics::MetricsWriter;

/// Stored entry. Expiry is unix nanoseconds; `i64::MAX` never expires.
#[derive(Debug, Clone)]
struct Entry<T> {
    payload: T,
    hash: u64,
    expire_at: i64,
}

#[derive(Debug)]
struct Slots<T> {
    entries: Vec<Entry<T>>,
    index: FxHashMap<u64, usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T> Slots<T> {
    fn upsert(&mut self, hash: u64, payload: T, expire_at: i64) {
        if let Some(&pos) = self.index.get(&hash) {
            self.entries[pos] = Entry {
                payload,
                hash,
                expire_at,
            };
            return;
        }
        self.entries.push(Entry {
            payload,
            hash,
            expire_at,
        });
        self.index.insert(hash, self.entries.len() - 1);
    }

    /// Removes the entry at `pos`, moving the last entry into its place.
    fn swap_remove(&mut self, pos: usize) -> Entry<T> {
        let removed = self.entries.swap_remove(pos);
        self.index.remove(&removed.hash);
        if let Some(moved) = self.entries.get(pos) {
            self.index.insert(moved.hash, pos);
        }
        removed
    }
}

/// Lock-guarded shard storing entries addressed by routing hash.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use ttlkit::clock::TestClock;
/// use ttlkit::metrics::NoopMetrics;
/// use ttlkit::store::Bucket;
///
/// let bucket = Bucket::new("0", Duration::from_secs(60), Arc::new(TestClock::frozen()), Arc::new(NoopMetrics));
/// bucket.set(0xfeed, "value");
/// assert_eq!(bucket.get(0xfeed).unwrap(), "value");
/// bucket.delete(0xfeed);
/// assert!(bucket.is_empty());
/// ```
pub struct Bucket<T> {
    id: String,
    ttl: Duration,
    ttl_nanos: i64,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsWriter>,
    slots: RwLock<Slots<T>>,
}

impl<T> Bucket<T> {
    /// Creates an empty bucket. `ttl == 0` disables expiry.
    pub fn new(
        id: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsWriter>,
    ) -> Self {
        Self {
            id: id.into(),
            ttl,
            ttl_nanos: i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX),
            clock,
            metrics,
            slots: RwLock::new(Slots::default()),
        }
    }

    /// Label used for metrics and logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.slots.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expire_after(&self, now: DateTime<Utc>) -> i64 {
        if self.ttl.is_zero() {
            return i64::MAX;
        }
        unix_nanos(now).saturating_add(self.ttl_nanos)
    }

    /// Inserts or overwrites the entry for `hash`, refreshing its expiry.
    pub fn set(&self, hash: u64, value: T) {
        let started = Instant::now();
        let expire_at = self.expire_after(self.clock.now());
        self.slots.write().upsert(hash, value, expire_at);
        self.metrics.set(&self.id, started.elapsed());
    }

    /// Inserts an entry with an explicit expiry (unix nanoseconds), as read
    /// back from a dump.
    ///
    /// A dump is a snapshot, so an entry already present is at least as new
    /// and is kept. Returns `true` if the entry was inserted.
    pub fn restore(&self, hash: u64, value: T, expire_at: i64) -> bool {
        let mut slots = self.slots.write();
        if slots.index.contains_key(&hash) {
            return false;
        }
        slots.upsert(hash, value, expire_at);
        drop(slots);
        self.metrics.load(&self.id);
        true
    }

    /// Removes the entry for `hash` if present. Absent keys are a no-op.
    pub fn delete(&self, hash: u64) {
        let mut slots = self.slots.write();
        if let Some(&pos) = slots.index.get(&hash) {
            slots.swap_remove(pos);
            drop(slots);
            self.metrics.del(&self.id);
        }
    }

    /// Removes and returns the entry for `hash` under a single exclusive lock.
    ///
    /// An expired entry is reported as [`CacheError::Expired`] and left for
    /// the eviction sweep.
    pub fn extract(&self, hash: u64) -> Result<T, CacheError> {
        let started = Instant::now();
        let now = unix_nanos(self.clock.now());
        let mut slots = self.slots.write();
        let Some(&pos) = slots.index.get(&hash) else {
            drop(slots);
            self.metrics.miss(&self.id);
            return Err(CacheError::NotFound);
        };
        if slots.entries[pos].expire_at < now {
            drop(slots);
            self.metrics.expire(&self.id);
            return Err(CacheError::Expired);
        }
        let entry = slots.swap_remove(pos);
        drop(slots);
        self.metrics.hit(&self.id, started.elapsed());
        self.metrics.del(&self.id);
        Ok(entry.payload)
    }

    /// Removes entries that expired more than one TTL ago. Returns the number
    /// of entries removed.
    pub fn evict(&self) -> usize {
        let now = unix_nanos(self.clock.now());
        let mut slots = self.slots.write();
        let mut evicted = 0;
        let mut i = 0;
        while i < slots.entries.len() {
            if now.saturating_sub(slots.entries[i].expire_at) > self.ttl_nanos {
                slots.swap_remove(i);
                evicted += 1;
            }
            i += 1;
        }
        let remaining = slots.entries.len();
        drop(slots);

        for _ in 0..evicted {
            self.metrics.evict(&self.id);
        }
        tracing::trace!(bucket = %self.id, evicted, remaining, "eviction sweep");
        evicted
    }

    /// Clears every entry, keeping allocated capacity.
    pub fn reset(&self) {
        let mut slots = self.slots.write();
        slots.entries.clear();
        slots.index.clear();
    }

    /// Releases the bucket's storage.
    pub fn close(&self) {
        *self.slots.write() = Slots::default();
    }

    /// Verifies that the index and the dense array describe the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let slots = self.slots.read();
        if slots.index.len() != slots.entries.len() {
            return Err(InvariantError::new(format!(
                "bucket {}: index has {} entries, array has {}",
                self.id,
                slots.index.len(),
                slots.entries.len()
            )));
        }
        for (&hash, &pos) in &slots.index {
            let entry = slots.entries.get(pos).ok_or_else(|| {
                InvariantError::new(format!(
                    "bucket {}: hash {:#x} points past the end ({} >= {})",
                    self.id,
                    hash,
                    pos,
                    slots.entries.len()
                ))
            })?;
            if entry.hash != hash {
                return Err(InvariantError::new(format!(
                    "bucket {}: index[{:#x}] = {} holds hash {:#x}",
                    self.id, hash, pos, entry.hash
                )));
            }
        }
        Ok(())
    }
}

impl<T: Clone> Bucket<T> {
    /// Returns a copy of the payload stored for `hash`.
    pub fn get(&self, hash: u64) -> Result<T, CacheError> {
        let started = Instant::now();
        let now = unix_nanos(self.clock.now());
        let slots = self.slots.read();
        let Some(&pos) = slots.index.get(&hash) else {
            drop(slots);
            self.metrics.miss(&self.id);
            return Err(CacheError::NotFound);
        };
        let entry = &slots.entries[pos];
        if entry.expire_at < now {
            drop(slots);
            self.metrics.expire(&self.id);
            return Err(CacheError::Expired);
        }
        let payload = entry.payload.clone();
        drop(slots);
        self.metrics.hit(&self.id, started.elapsed());
        Ok(payload)
    }
}

impl<T> Bucket<T> {
    /// Streams every live entry into `writer`, one record per entry.
    ///
    /// Holds the shared lock for the whole sweep, so concurrent reads proceed
    /// and writes wait. Stops at the first encoder or writer error. Returns the
    /// number of records written.
    pub fn dump(&self, encoder: &dyn Encoder<T>, writer: &dyn DumpWriter) -> Result<usize, CacheError> {
        let now = unix_nanos(self.clock.now());
        let slots = self.slots.read();
        let mut record = DumpEntry {
            key: 0,
            body: Vec::new(),
            expire: 0,
        };
        let mut written = 0;
        for entry in slots.entries.iter().filter(|e| e.expire_at >= now) {
            record.body.clear();
            encoder.encode(&mut record.body, &entry.payload)?;
            record.key = entry.hash;
            record.expire = expire_to_secs(entry.expire_at);
            writer.write(&record)?;
            self.metrics.dump(&self.id);
            written += 1;
        }
        tracing::trace!(bucket = %self.id, written, "dump sweep");
        Ok(written)
    }
}

impl<T> std::fmt::Debug for Bucket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("id", &self.id)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
