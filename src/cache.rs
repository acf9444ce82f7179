//! Sharded TTL cache.
//!
//! [`Cache`] owns a fixed array of [`Bucket`]s, routes each key to one of them
//! by hash, and drives the background work: periodic eviction, periodic dumps
//! and replay of a previous dump at startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                               Cache<T>                                   │
//! │                                                                          │
//! │  set/get/delete/extract(key)                                             │
//! │        │                                                                 │
//! │        ├── status == Active?  (else Closed / Uninitialized / Config)     │
//! │        ├── hash = hasher.sum64(key)                                      │
//! │        └── buckets[hash % n] ──► one lock, one shard                     │
//! │                                                                          │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐       ┌──────────┐               │
//! │  │ Bucket 0 │ │ Bucket 1 │ │ Bucket 2 │  ...  │ Bucket n │               │
//! │  └──────────┘ └──────────┘ └──────────┘       └──────────┘               │
//! │        ▲            ▲            ▲                  ▲                    │
//! │        └────────────┴──── fan_out(workers) ─────────┘                    │
//! │                 evict / dump / reset / close                             │
//! │                                                                          │
//! │  Clock ── every evict_interval ──► evict    (Weak<Core>)                 │
//! │        └─ every dump_interval  ──► dump + flush                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//!   Uninitialized ──(init ok)──► Active ──(close)──► Closed
//!         │
//!         └──(init error)──► stays Uninitialized, error cached
//! ```
//!
//! [`Cache::new`] initializes eagerly; [`Cache::lazy`] defers initialization
//! to the first call. Either way the configuration is validated once and a
//! failure is returned from every later call.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ttlkit::error::CacheError;
//! use ttlkit::{Cache, Config, FxKeyHasher};
//!
//! let cache = Cache::new(Config::<String> {
//!     buckets: 8,
//!     hasher: Some(Arc::new(FxKeyHasher)),
//!     ttl: Duration::from_secs(60),
//!     ..Config::default()
//! })
//! .unwrap();
//!
//! cache.set("user:1", "ann".to_string()).unwrap();
//! assert_eq!(cache.get("user:1").unwrap(), "ann");
//! assert_eq!(cache.extract("user:1").unwrap(), "ann");
//! assert!(matches!(cache.get("user:1"), Err(CacheError::NotFound)));
//!
//! cache.close().unwrap();
//! assert!(matches!(cache.set("user:2", "bob".into()), Err(CacheError::Closed)));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};

use crossbeam::channel;
use parking_lot::Mutex;

use crate::clock::unix_nanos;
use crate::config::{Config, RestoreSettings, Settings};
use crate::ds::{ShardSelector, fan_out};
use crate::dump::{DumpEntry, expire_from_secs};
use crate::error::{CacheError, ConfigError};
use crate::store::Bucket;

/// Consecutive reader failures after which a replay gives up.
const MAX_CONSECUTIVE_READ_ERRORS: usize = 16;

/// Lifecycle state of a [`Cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CacheStatus {
    /// Not initialized yet, initialization failed, or a startup replay is
    /// still running.
    Uninitialized = 0,
    Active = 1,
    Closed = 2,
}

impl CacheStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CacheStatus::Active,
            2 => CacheStatus::Closed,
            _ => CacheStatus::Uninitialized,
        }
    }
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

struct Core<T> {
    status: AtomicU8,
    buckets: Box<[Bucket<T>]>,
    selector: ShardSelector,
    settings: Settings<T>,
    loader: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Core<T> {
    fn status(&self) -> CacheStatus {
        CacheStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: CacheStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    #[inline]
    fn bucket(&self, hash: u64) -> &Bucket<T> {
        &self.buckets[self.selector.shard_for_hash(hash)]
    }

    /// Joins a background replay, if one was started and not joined yet.
    fn join_loader(&self) {
        let handle = self.loader.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                self.report(format_args!("dump replay thread panicked"));
            }
        }
    }

    /// Reports a background failure to the configured logger, or to
    /// `tracing` when none is configured.
    fn report(&self, args: fmt::Arguments<'_>) {
        match &self.settings.logger {
            Some(logger) => logger.log(args),
            None => tracing::warn!(target: "ttlkit", "{}", args),
        }
    }
}

impl<T: Send + Sync> Core<T> {
    fn bulk_evict(&self) -> usize {
        let evicted = AtomicUsize::new(0);
        fan_out(self.buckets.len(), self.settings.evict_workers, |i| {
            evicted.fetch_add(self.buckets[i].evict(), Ordering::Relaxed);
        });
        let evicted = evicted.into_inner();
        tracing::trace!(evicted, "eviction pass finished");
        evicted
    }

    fn bulk_reset(&self) {
        fan_out(self.buckets.len(), self.settings.evict_workers, |i| {
            self.buckets[i].reset();
        });
    }

    fn bulk_close(&self) {
        fan_out(self.buckets.len(), self.settings.evict_workers, |i| {
            self.buckets[i].close();
        });
    }

    /// Dumps every bucket, then flushes the writer. Per-bucket failures are
    /// reported and skipped; the flush error is returned.
    fn bulk_dump(&self) -> Result<usize, CacheError> {
        let Some(dump) = &self.settings.dump else {
            return Ok(0);
        };
        let written = AtomicUsize::new(0);
        fan_out(self.buckets.len(), dump.workers, |i| {
            let bucket = &self.buckets[i];
            match bucket.dump(dump.encoder.as_ref(), dump.writer.as_ref()) {
                Ok(n) => {
                    written.fetch_add(n, Ordering::Relaxed);
                },
                Err(err) => self.report(format_args!("dump of bucket {} failed: {}", bucket.id(), err)),
            }
        });
        dump.writer.flush()?;
        let written = written.into_inner();
        tracing::debug!(written, "dump finished");
        Ok(written)
    }

    fn restore_entry(&self, restore: &RestoreSettings<T>, entry: DumpEntry, now: i64) -> bool {
        let expire_at = expire_from_secs(entry.expire);
        if expire_at < now {
            return false;
        }
        match restore.decoder.decode(&entry.body) {
            Ok(value) => self.bucket(entry.key).restore(entry.key, value, expire_at),
            Err(err) => {
                self.report(format_args!("decode of dumped key {:#x} failed: {}", entry.key, err));
                false
            },
        }
    }

    /// Drains the dump reader into the buckets.
    ///
    /// One feeder (this thread) reads records into a bounded queue; restore
    /// workers decode them and insert each into the bucket its key routes to.
    /// A key already present (written while an async replay runs) is kept.
    fn replay(&self) -> usize {
        let Some(restore) = &self.settings.restore else {
            return 0;
        };
        let now = unix_nanos(self.settings.clock.now());
        let restored = AtomicUsize::new(0);
        let (tx, rx) = channel::bounded::<DumpEntry>(restore.buffer);

        thread::scope(|s| {
            for _ in 0..restore.workers {
                let rx = rx.clone();
                let restored = &restored;
                s.spawn(move || {
                    for entry in rx.iter() {
                        if self.restore_entry(restore, entry, now) {
                            restored.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
            drop(rx);

            let mut failures = 0;
            while self.status() != CacheStatus::Closed {
                match restore.reader.read() {
                    Ok(Some(entry)) => {
                        failures = 0;
                        if tx.send(entry).is_err() {
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(err) => {
                        self.report(format_args!("dump read failed: {}", err));
                        failures += 1;
                        if failures >= MAX_CONSECUTIVE_READ_ERRORS {
                            self.report(format_args!("giving up dump replay after {} consecutive errors", failures));
                            break;
                        }
                    },
                }
            }
            drop(tx);
        });

        let restored = restored.into_inner();
        tracing::debug!(restored, "dump replay finished");
        restored
    }
}

impl<T: Send + Sync + 'static> Core<T> {
    fn init(config: &Config<T>) -> Result<Arc<Self>, ConfigError> {
        let settings = config.resolve()?;
        let buckets: Box<[Bucket<T>]> = (0..settings.buckets)
            .map(|i| {
                Bucket::new(
                    i.to_string(),
                    settings.ttl,
                    Arc::clone(&settings.clock),
                    Arc::clone(&settings.metrics),
                )
            })
            .collect();
        let core = Arc::new(Core {
            status: AtomicU8::new(CacheStatus::Uninitialized as u8),
            selector: ShardSelector::new(buckets.len()),
            buckets,
            settings,
            loader: Mutex::new(None),
        });

        core.settings.clock.start();
        match &core.settings.restore {
            Some(restore) if restore.run_async => {
                core.set_status(CacheStatus::Active);
                let loader = Arc::clone(&core);
                let spawned = thread::Builder::new()
                    .name("ttlkit-restore".to_string())
                    .spawn(move || {
                        loader.replay();
                    });
                match spawned {
                    Ok(handle) => *core.loader.lock() = Some(handle),
                    Err(err) => {
                        core.report(format_args!("failed to spawn restore thread, replaying inline: {}", err));
                        core.replay();
                    },
                }
            },
            Some(_) => {
                core.replay();
                core.set_status(CacheStatus::Active);
            },
            None => core.set_status(CacheStatus::Active),
        }

        Self::schedule_jobs(&core);
        tracing::debug!(
            buckets = core.buckets.len(),
            ttl = ?core.settings.ttl,
            "cache initialized"
        );
        Ok(core)
    }

    fn schedule_jobs(core: &Arc<Self>) {
        let settings = &core.settings;
        if !settings.ttl.is_zero() {
            let weak: Weak<Self> = Arc::downgrade(core);
            settings.clock.schedule(
                settings.evict_interval,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        if core.status() == CacheStatus::Active {
                            core.bulk_evict();
                        }
                    }
                }),
            );
        }
        if let Some(dump) = &settings.dump {
            if !dump.interval.is_zero() {
                let weak: Weak<Self> = Arc::downgrade(core);
                settings.clock.schedule(
                    dump.interval,
                    Box::new(move || {
                        if let Some(core) = weak.upgrade() {
                            if core.status() != CacheStatus::Active {
                                return;
                            }
                            if let Err(err) = core.bulk_dump() {
                                core.report(format_args!("scheduled dump failed: {}", err));
                            }
                        }
                    }),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Sharded in-memory key/value cache with per-entry TTL.
///
/// All methods take `&self`; share a cache between threads with `Arc`.
pub struct Cache<T> {
    config: Config<T>,
    core: OnceLock<Result<Arc<Core<T>>, ConfigError>>,
}

impl<T> Cache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Validates `config` and initializes the cache, replaying a dump first
    /// if a reader is configured.
    pub fn new(config: Config<T>) -> Result<Self, CacheError> {
        let cache = Self::lazy(config);
        cache.core()?;
        Ok(cache)
    }

    /// Creates a cache that initializes on its first operation.
    pub fn lazy(config: Config<T>) -> Self {
        Self {
            config,
            core: OnceLock::new(),
        }
    }

    fn core(&self) -> Result<&Arc<Core<T>>, CacheError> {
        match self.core.get_or_init(|| Core::init(&self.config)) {
            Ok(core) => Ok(core),
            Err(err) => Err(CacheError::Config(err.clone())),
        }
    }

    fn active(&self) -> Result<&Arc<Core<T>>, CacheError> {
        let core = self.core()?;
        match core.status() {
            CacheStatus::Active => Ok(core),
            CacheStatus::Closed => Err(CacheError::Closed),
            CacheStatus::Uninitialized => Err(CacheError::Uninitialized),
        }
    }

    /// Current lifecycle state. Does not trigger lazy initialization.
    pub fn status(&self) -> CacheStatus {
        match self.core.get() {
            Some(Ok(core)) => core.status(),
            _ => CacheStatus::Uninitialized,
        }
    }

    /// Stores `value` under `key`, replacing any previous value and
    /// restarting its TTL.
    pub fn set(&self, key: impl AsRef<[u8]>, value: T) -> Result<(), CacheError> {
        let core = self.active()?;
        let hash = core.settings.hasher.sum64(key.as_ref());
        core.bucket(hash).set(hash, value);
        Ok(())
    }

    /// Returns a copy of the value stored under `key`.
    ///
    /// Fails with [`CacheError::NotFound`] or [`CacheError::Expired`] when
    /// there is no live value.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<T, CacheError> {
        let core = self.active()?;
        let hash = core.settings.hasher.sum64(key.as_ref());
        core.bucket(hash).get(hash)
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<(), CacheError> {
        let core = self.active()?;
        let hash = core.settings.hasher.sum64(key.as_ref());
        core.bucket(hash).delete(hash);
        Ok(())
    }

    /// Atomically removes and returns the value stored under `key`.
    ///
    /// Of several concurrent calls for the same key exactly one succeeds.
    pub fn extract(&self, key: impl AsRef<[u8]>) -> Result<T, CacheError> {
        let core = self.active()?;
        let hash = core.settings.hasher.sum64(key.as_ref());
        core.bucket(hash).extract(hash)
    }

    /// Removes every entry, keeping the cache active.
    pub fn reset(&self) -> Result<(), CacheError> {
        self.active()?.bulk_reset();
        Ok(())
    }

    /// Runs an eviction sweep over every bucket now. Returns the number of
    /// entries removed.
    pub fn evict(&self) -> Result<usize, CacheError> {
        Ok(self.active()?.bulk_evict())
    }

    /// Dumps every live entry and flushes the writer. Returns the number of
    /// records written; `0` when no dump writer is configured.
    pub fn dump(&self) -> Result<usize, CacheError> {
        self.active()?.bulk_dump()
    }

    /// Waits for a background startup replay to finish.
    pub fn wait_restored(&self) -> Result<(), CacheError> {
        self.core()?.join_loader();
        Ok(())
    }

    /// Stops background work and releases every bucket.
    ///
    /// Closing twice returns [`CacheError::Closed`].
    pub fn close(&self) -> Result<(), CacheError> {
        let core = self.core()?;
        if let Err(raw) = core.status.compare_exchange(
            CacheStatus::Active as u8,
            CacheStatus::Closed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match CacheStatus::from_u8(raw) {
                CacheStatus::Closed => CacheError::Closed,
                _ => CacheError::Uninitialized,
            });
        }
        core.settings.clock.stop();
        self.wait_restored()?;
        core.bulk_close();
        tracing::debug!("cache closed");
        Ok(())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        match self.core.get() {
            Some(Ok(core)) => core.buckets.iter().map(Bucket::len).sum(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.config.buckets
    }
}

impl<T> Drop for Cache<T> {
    fn drop(&mut self) {
        if let Some(Ok(core)) = self.core.get() {
            // stops a background replay at its next record
            let _ = core.status.compare_exchange(
                CacheStatus::Active as u8,
                CacheStatus::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            core.settings.clock.stop();
            core.join_loader();
        }
    }
}

impl<T> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.core.get() {
            Some(Ok(core)) => core.status(),
            _ => CacheStatus::Uninitialized,
        };
        f.debug_struct("Cache")
            .field("status", &status)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::time::{Duration, Instant};

    use chrono::TimeDelta;

    use super::*;
    use crate::clock::{Clock, TestClock};
    use crate::dump::{DumpReader, DumpWriter};
    use crate::endec::MessageEndec;
    use crate::error::DumpError;
    use crate::hasher::FxKeyHasher;
    use crate::logger::tests::CaptureLogger;

    fn config(clock: &Arc<TestClock>) -> Config<Vec<u8>> {
        Config {
            buckets: 4,
            hasher: Some(Arc::new(FxKeyHasher)),
            ttl: Duration::from_secs(1),
            clock: Some(clock.clone()),
            ..Config::default()
        }
    }

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    /// Reader serving a fixed list of records.
    struct ListReader(Mutex<Vec<DumpEntry>>);

    impl DumpReader for ListReader {
        fn read(&self) -> Result<Option<DumpEntry>, DumpError> {
            Ok(self.0.lock().pop())
        }
    }

    /// Reader that always fails.
    struct BrokenReader;

    impl DumpReader for BrokenReader {
        fn read(&self) -> Result<Option<DumpEntry>, DumpError> {
            Err(DumpError::Truncated)
        }
    }

    #[derive(Default)]
    struct VecWriter {
        records: Mutex<Vec<DumpEntry>>,
        flushes: AtomicUsize,
    }

    impl DumpWriter for VecWriter {
        fn write(&self, entry: &DumpEntry) -> Result<usize, DumpError> {
            self.records.lock().push(entry.clone());
            Ok(entry.body.len())
        }

        fn flush(&self) -> Result<(), DumpError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn lazy_cache_initializes_on_first_use() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::lazy(config(&clock));
        assert_eq!(cache.status(), CacheStatus::Uninitialized);
        cache.set("k", vec![1]).unwrap();
        assert_eq!(cache.status(), CacheStatus::Active);
    }

    #[test]
    fn failed_init_is_cached() {
        let cache = Cache::lazy(Config::<Vec<u8>> {
            buckets: 0,
            hasher: Some(Arc::new(FxKeyHasher)),
            ..Config::default()
        });
        for _ in 0..2 {
            assert!(matches!(
                cache.get("k"),
                Err(CacheError::Config(ConfigError::NoBuckets))
            ));
        }
        assert_eq!(cache.status(), CacheStatus::Uninitialized);
        assert!(matches!(cache.close(), Err(CacheError::Config(_))));
    }

    #[test]
    fn close_twice_reports_closed() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(config(&clock)).unwrap();
        cache.close().unwrap();
        assert!(matches!(cache.close(), Err(CacheError::Closed)));
        assert!(!clock.active());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn scheduled_eviction_follows_clock_jumps() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(config(&clock)).unwrap();
        cache.set("a", vec![1]).unwrap();
        cache.set("b", vec![2]).unwrap();
        assert_eq!(cache.len(), 2);

        // expired at +1s, swept once more than one TTL past expiry; each
        // jump wakes the sweep again for entries a previous pass skipped
        clock.jump(TimeDelta::milliseconds(2600));
        assert!(wait_until(Duration::from_secs(2), || {
            clock.jump(TimeDelta::milliseconds(600));
            cache.len() == 0
        }));
    }

    #[test]
    fn zero_ttl_schedules_nothing() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(Config {
            ttl: Duration::ZERO,
            ..config(&clock)
        })
        .unwrap();
        cache.set("a", vec![1]).unwrap();
        clock.jump(TimeDelta::days(1));
        assert_eq!(cache.get("a").unwrap(), [1]);
        assert_eq!(cache.evict().unwrap(), 0);
    }

    #[test]
    fn dump_without_writer_is_a_no_op() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(config(&clock)).unwrap();
        cache.set("a", vec![1]).unwrap();
        assert_eq!(cache.dump().unwrap(), 0);
    }

    #[test]
    fn dump_writes_every_live_entry_and_flushes() {
        let clock = Arc::new(TestClock::frozen());
        let writer = Arc::new(VecWriter::default());
        let cache = Cache::new(Config {
            encoder: Some(Arc::new(MessageEndec)),
            dump_writer: Some(writer.clone()),
            ..config(&clock)
        })
        .unwrap();
        for i in 0..20u8 {
            cache.set([i], vec![i]).unwrap();
        }
        assert_eq!(cache.dump().unwrap(), 20);
        assert_eq!(writer.records.lock().len(), 20);
        assert_eq!(writer.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replay_restores_live_records_and_drops_expired() {
        let clock = Arc::new(TestClock::frozen());
        let now_secs = u32::try_from(clock.now().timestamp()).unwrap();
        let hasher = FxKeyHasher;
        let records = vec![
            DumpEntry {
                key: crate::hasher::KeyHasher::sum64(&hasher, b"live"),
                body: b"L".to_vec(),
                expire: now_secs + 30,
            },
            DumpEntry {
                key: crate::hasher::KeyHasher::sum64(&hasher, b"forever"),
                body: b"F".to_vec(),
                expire: u32::MAX,
            },
            DumpEntry {
                key: crate::hasher::KeyHasher::sum64(&hasher, b"stale"),
                body: b"S".to_vec(),
                expire: now_secs - 30,
            },
        ];
        let cache = Cache::new(Config {
            decoder: Some(Arc::new(MessageEndec)),
            dump_reader: Some(Arc::new(ListReader(Mutex::new(records)))),
            dump_read_workers: 2,
            ..config(&clock)
        })
        .unwrap();

        assert_eq!(cache.status(), CacheStatus::Active);
        assert_eq!(cache.get("live").unwrap(), b"L");
        assert_eq!(cache.get("forever").unwrap(), b"F");
        assert!(matches!(cache.get("stale"), Err(CacheError::NotFound)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn async_replay_is_joinable() {
        let clock = Arc::new(TestClock::frozen());
        let records = (0..100u64)
            .map(|i| DumpEntry {
                key: i,
                body: vec![i as u8],
                expire: u32::MAX,
            })
            .collect();
        let cache = Cache::new(Config {
            decoder: Some(Arc::new(MessageEndec)),
            dump_reader: Some(Arc::new(ListReader(Mutex::new(records)))),
            dump_read_async: true,
            ..config(&clock)
        })
        .unwrap();
        assert_eq!(cache.status(), CacheStatus::Active);
        cache.wait_restored().unwrap();
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn reader_failures_are_logged_and_bounded() {
        let clock = Arc::new(TestClock::frozen());
        let logger = Arc::new(CaptureLogger::default());
        let cache = Cache::new(Config {
            decoder: Some(Arc::new(MessageEndec)),
            dump_reader: Some(Arc::new(BrokenReader)),
            logger: Some(logger.clone()),
            ..config(&clock)
        })
        .unwrap();
        assert_eq!(cache.status(), CacheStatus::Active);
        let lines = logger.lines.lock();
        assert_eq!(lines.len(), MAX_CONSECUTIVE_READ_ERRORS + 1);
        assert!(lines[0].contains("truncated"), "{}", lines[0]);
    }

    #[test]
    fn concurrent_extract_of_one_key() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(config(&clock)).unwrap();
        cache.set("once", vec![1]).unwrap();
        let barrier = Barrier::new(6);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.extract("once")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, CacheError::NotFound))
        );
    }

    /// Reader that waits `delay` before every record and counts its calls.
    struct SlowReader {
        remaining: AtomicUsize,
        reads: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl DumpReader for SlowReader {
        fn read(&self) -> Result<Option<DumpEntry>, DumpError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let left = self.remaining.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(None);
            }
            self.remaining.store(left - 1, Ordering::SeqCst);
            Ok(Some(DumpEntry {
                key: left as u64,
                body: vec![1],
                expire: u32::MAX,
            }))
        }
    }

    /// Reader that serves its records only after the test releases it.
    struct GatedReader {
        gate: channel::Receiver<()>,
        records: Mutex<Vec<DumpEntry>>,
    }

    impl DumpReader for GatedReader {
        fn read(&self) -> Result<Option<DumpEntry>, DumpError> {
            let mut records = self.records.lock();
            if !records.is_empty() {
                let _ = self.gate.recv();
            }
            Ok(records.pop())
        }
    }

    #[test]
    fn async_replay_keeps_newer_foreground_writes() {
        let clock = Arc::new(TestClock::frozen());
        let (release, gate) = channel::bounded(1);
        let key = crate::hasher::KeyHasher::sum64(&FxKeyHasher, b"k");
        let cache = Cache::new(Config {
            decoder: Some(Arc::new(MessageEndec)),
            dump_reader: Some(Arc::new(GatedReader {
                gate,
                records: Mutex::new(vec![DumpEntry {
                    key,
                    body: b"stale".to_vec(),
                    expire: u32::MAX,
                }]),
            })),
            dump_read_async: true,
            ..config(&clock)
        })
        .unwrap();

        cache.set("k", b"fresh".to_vec()).unwrap();
        release.send(()).unwrap();
        cache.wait_restored().unwrap();

        assert_eq!(cache.get("k").unwrap(), b"fresh");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drop_halts_async_replay() {
        let clock = Arc::new(TestClock::frozen());
        let reads = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(Config {
            decoder: Some(Arc::new(MessageEndec)),
            dump_reader: Some(Arc::new(SlowReader {
                remaining: AtomicUsize::new(200),
                reads: Arc::clone(&reads),
                delay: Duration::from_millis(5),
            })),
            dump_read_async: true,
            ..config(&clock)
        })
        .unwrap();
        drop(cache);

        let at_drop = reads.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(reads.load(Ordering::SeqCst), at_drop);
        assert!(at_drop < 201, "reader drained after drop: {at_drop}");
    }

    #[test]
    fn drop_stops_the_clock() {
        let clock = Arc::new(TestClock::frozen());
        let cache = Cache::new(config(&clock)).unwrap();
        assert!(clock.active());
        drop(cache);
        assert!(!clock.active());
    }
}
