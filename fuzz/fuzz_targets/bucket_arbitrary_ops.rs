#![no_main]

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use libfuzzer_sys::fuzz_target;
use ttlkit::clock::TestClock;
use ttlkit::metrics::NoopMetrics;
use ttlkit::store::Bucket;

// Fuzz arbitrary bucket operations
//
// Each byte pair is an opcode and a key; the dense entry array and its index
// must stay consistent after every operation.
fuzz_target!(|data: &[u8]| {
    let clock = Arc::new(TestClock::frozen());
    let bucket: Bucket<u16> = Bucket::new("fuzz", Duration::from_secs(1), clock.clone(), Arc::new(NoopMetrics));

    for pair in data.chunks_exact(2) {
        let hash = u64::from(pair[1] % 32);
        match pair[0] % 6 {
            0 => bucket.set(hash, u16::from(pair[1])),
            1 => {
                let _ = bucket.get(hash);
            },
            2 => bucket.delete(hash),
            3 => {
                if let Ok(value) = bucket.extract(hash) {
                    assert_eq!(value % 32, u16::from(pair[1] % 32));
                }
            },
            4 => {
                let before = bucket.len();
                let evicted = bucket.evict();
                assert_eq!(bucket.len(), before - evicted);
            },
            _ => clock.jump(TimeDelta::milliseconds(i64::from(pair[1]) * 10)),
        }
        bucket.check_invariants().unwrap();
    }
});
