#![no_main]

use libfuzzer_sys::fuzz_target;
use ttlkit::ds::ShardSelector;
use ttlkit::hasher::{KeyHasher, SipKeyHasher};

// Fuzz shard selection
//
// Routing must be deterministic and in range for any shard count and key.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let shard_count = usize::from(data[0] % 64) + 1;
    let selector = ShardSelector::new(shard_count);
    let hasher = SipKeyHasher::new(u64::from(data[1]));
    assert_eq!(selector.shard_count(), shard_count);

    for window in data[2..].windows(4) {
        let hash = hasher.sum64(window);
        let shard = selector.shard_for_hash(hash);
        assert!(shard < shard_count);
        assert_eq!(shard, selector.shard_for_hash(hasher.sum64(window)));
    }
});
