//! Schedulable clock abstraction.
//!
//! The cache never reads the system time directly: entry expiry, eviction
//! sweeps and periodic dumps all go through a [`Clock`]. Production code uses
//! [`NativeClock`]; tests use [`TestClock`], which can [`jump`](TestClock::jump)
//! forward or backward so expiry and sweep logic run deterministically without
//! sleeping.
//!
//! ## Scheduling Model
//!
//! ```text
//!   schedule(interval, job)
//!         │
//!         ├── spawns one driver thread per job
//!         │
//!         ▼
//!   ┌──────────────┐   due    ┌───────────────────────────────┐
//!   │ driver loop  │ ───────► │ gate.read(): if !cancelled    │
//!   │ (waits until │          │     job()                     │
//!   │  next due)   │ ◄─────── │                               │
//!   └──────────────┘          └───────────────────────────────┘
//!
//!   stop(): gate.write() = cancelled for every job, then wakes drivers.
//! ```
//!
//! A job runs while holding the shared side of its gate and `stop` takes the
//! exclusive side, so once `stop` returns no new invocation can begin. An
//! invocation already running is not interrupted; `stop` waits for it. A job
//! must therefore never call `stop` on its own clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::{Condvar, Mutex, RwLock};

/// Callback registered through [`Clock::schedule`].
pub type Job = Box<dyn Fn() + Send + Sync + 'static>;

/// Time source and periodic scheduler.
pub trait Clock: Send + Sync {
    /// Marks the clock as running.
    fn start(&self);

    /// Cancels every job scheduled through this clock and marks it stopped.
    fn stop(&self);

    /// Reports whether the clock is running.
    fn active(&self) -> bool;

    /// Returns the current logical time.
    fn now(&self) -> DateTime<Utc>;

    /// Registers `job` to run every `interval` until [`stop`](Clock::stop).
    fn schedule(&self, interval: Duration, job: Job);
}

/// Converts a timestamp to unix nanoseconds, saturating outside the `i64` range.
#[inline]
pub(crate) fn unix_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(if at.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

// ---------------------------------------------------------------------------
// Job gate
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct JobGate {
    cancelled: RwLock<bool>,
}

impl JobGate {
    fn cancel(&self) {
        *self.cancelled.write() = true;
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.read()
    }

    /// Runs `job` unless cancelled. Returns `false` once cancelled.
    fn run(&self, job: &Job) -> bool {
        let cancelled = self.cancelled.read();
        if *cancelled {
            return false;
        }
        job();
        true
    }
}

fn spawn_driver<F>(name: &str, driver: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name.to_string()).spawn(driver) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(error = %err, "failed to spawn clock driver thread; job not scheduled");
            false
        },
    }
}

// ---------------------------------------------------------------------------
// NativeClock
// ---------------------------------------------------------------------------

struct NativeJob {
    gate: Arc<JobGate>,
    // dropping the sender disconnects the driver's receiver
    _cancel: channel::Sender<()>,
}

/// Real-time clock backed by `chrono::Utc::now`.
///
/// Each scheduled job gets a driver thread that sleeps on a cancellation
/// channel with a deadline, so `stop` (or dropping the clock) wakes it
/// immediately.
pub struct NativeClock {
    active: AtomicBool,
    jobs: Mutex<Vec<NativeJob>>,
}

impl NativeClock {
    /// Creates a running clock with no scheduled jobs.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of jobs currently scheduled.
    pub fn scheduled_jobs(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl Default for NativeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NativeClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeClock")
            .field("active", &self.active())
            .field("scheduled_jobs", &self.scheduled_jobs())
            .finish()
    }
}

impl Clock for NativeClock {
    fn start(&self) {
        self.active.store(true, Ordering::Release);
    }

    fn stop(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock());
        for job in &jobs {
            job.gate.cancel();
        }
        drop(jobs);
        self.active.store(false, Ordering::Release);
    }

    fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&self, interval: Duration, job: Job) {
        let interval = interval.max(Duration::from_millis(1));
        let gate = Arc::new(JobGate::default());
        let (cancel_tx, cancel_rx) = channel::bounded::<()>(0);

        let driver_gate = Arc::clone(&gate);
        let spawned = spawn_driver("ttlkit-clock", move || {
            let mut due = Instant::now() + interval;
            loop {
                match cancel_rx.recv_deadline(due) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !driver_gate.run(&job) {
                            return;
                        }
                        let now = Instant::now();
                        due += interval;
                        if due <= now {
                            due = now + interval;
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        if spawned {
            self.jobs.lock().push(NativeJob {
                gate,
                _cancel: cancel_tx,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// TestClock
// ---------------------------------------------------------------------------

struct TestShared {
    frozen_at: Option<DateTime<Utc>>,
    offset: Mutex<TimeDelta>,
    moved: Condvar,
}

impl TestShared {
    fn now_with(&self, offset: TimeDelta) -> DateTime<Utc> {
        let base = self.frozen_at.unwrap_or_else(Utc::now);
        base.checked_add_signed(offset).unwrap_or(base)
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock();
        self.now_with(offset)
    }
}

/// Clock with time travel for tests.
///
/// [`TestClock::new`] follows real time shifted by the accumulated jumps;
/// [`TestClock::frozen`] stands still and only moves on [`jump`](Self::jump).
/// Scheduled jobs observe jumps: jumping past a job's due time wakes it
/// immediately, and a jump across several intervals fires it once.
///
/// # Example
///
/// ```
/// use chrono::TimeDelta;
/// use ttlkit::clock::{Clock, TestClock};
///
/// let clock = TestClock::frozen();
/// let before = clock.now();
/// clock.jump(TimeDelta::seconds(90));
/// assert_eq!(clock.now() - before, TimeDelta::seconds(90));
/// clock.jump(TimeDelta::seconds(-30));
/// assert_eq!(clock.now() - before, TimeDelta::seconds(60));
/// ```
pub struct TestClock {
    shared: Arc<TestShared>,
    active: AtomicBool,
    jobs: Mutex<Vec<Arc<JobGate>>>,
}

impl TestClock {
    /// Creates a clock that follows real time plus any jumps.
    pub fn new() -> Self {
        Self::with_base(None)
    }

    /// Creates a clock frozen at the current instant.
    pub fn frozen() -> Self {
        Self::with_base(Some(Utc::now()))
    }

    /// Creates a clock frozen at `at`.
    pub fn frozen_at(at: DateTime<Utc>) -> Self {
        Self::with_base(Some(at))
    }

    fn with_base(frozen_at: Option<DateTime<Utc>>) -> Self {
        Self {
            shared: Arc::new(TestShared {
                frozen_at,
                offset: Mutex::new(TimeDelta::zero()),
                moved: Condvar::new(),
            }),
            active: AtomicBool::new(true),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Shifts the clock by `delta`, which may be negative.
    pub fn jump(&self, delta: TimeDelta) {
        {
            let mut offset = self.shared.offset.lock();
            *offset = offset.checked_add(&delta).unwrap_or(*offset);
        }
        self.shared.moved.notify_all();
    }

    /// Returns the total shift applied by jumps so far.
    pub fn offset(&self) -> TimeDelta {
        *self.shared.offset.lock()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TestClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClock")
            .field("frozen", &self.shared.frozen_at.is_some())
            .field("offset", &self.offset())
            .field("active", &self.active())
            .finish()
    }
}

impl Clock for TestClock {
    fn start(&self) {
        self.active.store(true, Ordering::Release);
    }

    fn stop(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock());
        for gate in &jobs {
            gate.cancel();
        }
        {
            // drivers check their gate under this lock before waiting
            let _offset = self.shared.offset.lock();
            self.shared.moved.notify_all();
        }
        self.active.store(false, Ordering::Release);
    }

    fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn now(&self) -> DateTime<Utc> {
        self.shared.now()
    }

    fn schedule(&self, interval: Duration, job: Job) {
        let step = TimeDelta::from_std(interval.max(Duration::from_millis(1)))
            .unwrap_or(TimeDelta::MAX);
        let gate = Arc::new(JobGate::default());
        let shared = Arc::clone(&self.shared);

        let driver_gate = Arc::clone(&gate);
        let spawned = spawn_driver("ttlkit-test-clock", move || {
            let mut due = shared.now().checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);
            loop {
                {
                    let mut offset = shared.offset.lock();
                    loop {
                        if driver_gate.is_cancelled() {
                            return;
                        }
                        let now = shared.now_with(*offset);
                        if now >= due {
                            break;
                        }
                        if shared.frozen_at.is_some() {
                            shared.moved.wait(&mut offset);
                        } else {
                            let wait = (due - now).to_std().unwrap_or(Duration::ZERO);
                            let _ = shared.moved.wait_for(&mut offset, wait);
                        }
                    }
                }

                if !driver_gate.run(&job) {
                    return;
                }

                let now = shared.now();
                due = due.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);
                if due <= now {
                    due = now.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);
                }
            }
        });

        if spawned {
            self.jobs.lock().push(gate);
        }
    }
}

impl Drop for TestClock {
    fn drop(&mut self) {
        self.stop();
    }
}
