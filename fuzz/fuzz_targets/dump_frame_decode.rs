#![no_main]

use libfuzzer_sys::fuzz_target;
use ttlkit::dump::frame::{encode_record, read_record, read_version};

// Feeds arbitrary bytes to the dump decoder.
//
// Decoding must never panic or allocate past the body limit, and every record
// it accepts must re-encode to exactly the bytes it consumed.
fuzz_target!(|data: &[u8]| {
    let mut cursor = data;
    if read_version(&mut cursor).is_err() {
        return;
    }

    loop {
        let before = cursor.len();
        match read_record(&mut cursor, 4096) {
            Ok(Some(entry)) => {
                assert!(entry.body.len() <= 4096);
                let consumed = before - cursor.len();
                let mut buf = Vec::new();
                assert_eq!(encode_record(&mut buf, &entry).unwrap(), consumed);
            },
            Ok(None) | Err(_) => break,
        }
    }
});
