//! Bounded fan-out worker pool for bulk per-bucket operations.
//!
//! ## Architecture
//!
//! ```text
//!   feeder (caller thread)          bounded queue (cap = W)        W workers
//!   ─────────────────────          ───────────────────────        ─────────
//!   for idx in 0..n ──send──►  [ idx | idx | ... ]  ──recv──►  op(idx)
//!                                                      ──recv──►  op(idx)
//!                                                      ──recv──►  op(idx)
//!
//!   fan_out() returns only after the queue is drained and every worker
//!   has exited (scoped threads are joined on scope exit).
//! ```
//!
//! A slow worker fills the queue, which blocks the feeder: memory stays
//! bounded by the queue capacity no matter how many buckets there are.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use ttlkit::ds::fan_out;
//!
//! let touched = AtomicUsize::new(0);
//! fan_out(32, 4, |_idx| {
//!     touched.fetch_add(1, Ordering::Relaxed);
//! });
//! assert_eq!(touched.load(Ordering::Relaxed), 32);
//! ```

use std::thread;

use crossbeam::channel;

/// Runs `op` once for every index in `0..items` on up to `workers` threads.
///
/// The worker count is clamped to `[1, items]`. Blocks until every index
/// has been processed. A panic inside `op` is propagated to the caller once
/// all workers have stopped.
pub fn fan_out<F>(items: usize, workers: usize, op: F)
where
    F: Fn(usize) + Sync,
{
    if items == 0 {
        return;
    }
    let workers = workers.clamp(1, items);
    if workers == 1 {
        (0..items).for_each(&op);
        return;
    }

    let (tx, rx) = channel::bounded::<usize>(workers);
    let op = &op;
    thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            scope.spawn(move || {
                for idx in rx.iter() {
                    op(idx);
                }
            });
        }
        drop(rx);

        for idx in 0..items {
            if tx.send(idx).is_err() {
                // every worker is gone (a panic unwound them); the scope
                // re-raises it on exit
                break;
            }
        }
        drop(tx);
    });
}
