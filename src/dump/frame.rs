//! Wire framing for dump streams.
//!
//! ```text
//!   stream := version:u32 record*
//!   record := key:u64 | len:u32 | body:[u8; len] | expire:u32
//! ```
//!
//! All integers are little-endian. There is no separator between records and
//! no trailer; the end of a stream is the end of its source. A source that
//! ends exactly on a record boundary is complete; one that ends anywhere else
//! is [`DumpError::Truncated`].

use std::io::{self, Read, Write};

use crate::dump::DumpEntry;
use crate::error::DumpError;

/// Format version written at the start of every dump stream.
pub const DUMP_FORMAT_VERSION: u32 = 1;

/// Largest record body a reader accepts unless configured otherwise (64 MiB).
pub const DEFAULT_MAX_BODY: usize = 64 << 20;

/// Fixed bytes per record on top of the body: key, length and expiry.
pub const RECORD_OVERHEAD: usize = 8 + 4 + 4;

/// Largest body the `u32` length field can describe.
pub const MAX_FRAME_BODY: usize = u32::MAX as usize;

/// Returns the length field for a body of `len` bytes, or
/// [`DumpError::BodyTooLarge`] if it does not fit the frame.
pub fn frame_body_len(len: usize) -> Result<u32, DumpError> {
    u32::try_from(len).map_err(|_| DumpError::BodyTooLarge {
        len,
        max: MAX_FRAME_BODY,
    })
}

/// Appends one framed record to `dst` and returns its size.
///
/// A body too long for the length field is rejected and `dst` is left
/// untouched.
pub fn encode_record(dst: &mut Vec<u8>, entry: &DumpEntry) -> Result<usize, DumpError> {
    let len = frame_body_len(entry.body.len())?;
    dst.reserve(RECORD_OVERHEAD + entry.body.len());
    dst.extend_from_slice(&entry.key.to_le_bytes());
    dst.extend_from_slice(&len.to_le_bytes());
    dst.extend_from_slice(&entry.body);
    dst.extend_from_slice(&entry.expire.to_le_bytes());
    Ok(RECORD_OVERHEAD + entry.body.len())
}

/// Writes the stream header.
pub fn write_version<W: Write>(w: &mut W, version: u32) -> io::Result<()> {
    w.write_all(&version.to_le_bytes())
}

/// Reads the stream header. Returns `Ok(None)` for an empty stream.
pub fn read_version<R: Read>(r: &mut R) -> Result<Option<u32>, DumpError> {
    let mut buf = [0u8; 4];
    match read_exact_or_eof(r, &mut buf)? {
        false => Ok(None),
        true => Ok(Some(u32::from_le_bytes(buf))),
    }
}

/// Reads the next record. Returns `Ok(None)` at a clean end of stream.
///
/// `max_body` bounds the declared body length so a corrupt length field
/// cannot trigger a huge allocation.
pub fn read_record<R: Read>(r: &mut R, max_body: usize) -> Result<Option<DumpEntry>, DumpError> {
    let mut head = [0u8; 12];
    if !read_exact_or_eof(r, &mut head)? {
        return Ok(None);
    }
    let (key, len) = head.split_at(8);
    let key = u64::from_le_bytes([key[0], key[1], key[2], key[3], key[4], key[5], key[6], key[7]]);
    let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if len > max_body {
        return Err(DumpError::BodyTooLarge { len, max: max_body });
    }

    let mut body = vec![0u8; len];
    read_exact_mid_record(r, &mut body)?;
    let mut expire = [0u8; 4];
    read_exact_mid_record(r, &mut expire)?;

    Ok(Some(DumpEntry {
        key,
        body,
        expire: u32::from_le_bytes(expire),
    }))
}

/// Fills `buf` completely. Returns `false` if the stream was already at its
/// end, [`DumpError::Truncated`] if it ended part way through.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<bool, DumpError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
            Err(err) => return Err(err.into()),
        }
    }
    match filled {
        0 if !buf.is_empty() => Ok(false),
        n if n == buf.len() => Ok(true),
        _ => Err(DumpError::Truncated),
    }
}

fn read_exact_mid_record<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), DumpError> {
    r.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => DumpError::Truncated,
        _ => err.into(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn entry(key: u64, body: &[u8], expire: u32) -> DumpEntry {
        DumpEntry {
            key,
            body: body.to_vec(),
            expire,
        }
    }

    #[test]
    fn record_layout_is_little_endian() {
        let mut buf = Vec::new();
        let n = encode_record(&mut buf, &entry(0x0102030405060708, b"hi", 0x0a0b0c0d)).unwrap();
        assert_eq!(n, 18);
        assert_eq!(
            buf,
            [
                0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // key
                0x02, 0x00, 0x00, 0x00, // len
                b'h', b'i', // body
                0x0d, 0x0c, 0x0b, 0x0a, // expire
            ]
        );
    }

    #[test]
    fn reads_records_until_clean_eof() {
        let mut buf = Vec::new();
        write_version(&mut buf, DUMP_FORMAT_VERSION).unwrap();
        encode_record(&mut buf, &entry(1, b"one", 10)).unwrap();
        encode_record(&mut buf, &entry(2, b"", u32::MAX)).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_version(&mut cur).unwrap(), Some(DUMP_FORMAT_VERSION));
        assert_eq!(read_record(&mut cur, DEFAULT_MAX_BODY).unwrap(), Some(entry(1, b"one", 10)));
        assert_eq!(read_record(&mut cur, DEFAULT_MAX_BODY).unwrap(), Some(entry(2, b"", u32::MAX)));
        assert_eq!(read_record(&mut cur, DEFAULT_MAX_BODY).unwrap(), None);
    }

    #[test]
    fn empty_stream_has_no_version() {
        assert_eq!(read_version(&mut Cursor::new(Vec::new())).unwrap(), None);
        assert!(matches!(
            read_version(&mut Cursor::new(vec![1, 0])),
            Err(DumpError::Truncated)
        ));
    }

    #[test]
    fn truncation_is_detected_at_every_offset() {
        let mut full = Vec::new();
        encode_record(&mut full, &entry(9, b"payload", 5)).unwrap();
        for cut in 1..full.len() {
            let err = read_record(&mut Cursor::new(&full[..cut]), DEFAULT_MAX_BODY).unwrap_err();
            assert!(matches!(err, DumpError::Truncated), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn body_length_must_fit_the_frame() {
        assert_eq!(frame_body_len(0).unwrap(), 0);
        assert_eq!(frame_body_len(MAX_FRAME_BODY).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn body_past_u32_range_is_rejected_not_truncated() {
        let err = frame_body_len(MAX_FRAME_BODY + 1).unwrap_err();
        assert!(matches!(
            err,
            DumpError::BodyTooLarge { len, max: MAX_FRAME_BODY } if len == MAX_FRAME_BODY + 1
        ));
    }

    #[test]
    fn oversized_body_is_rejected_before_allocating() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u64.to_le_bytes());
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = read_record(&mut Cursor::new(buf), 1024).unwrap_err();
        assert!(matches!(err, DumpError::BodyTooLarge { len, max: 1024 } if len == u32::MAX as usize));
    }
}

#[cfg(test)]
mod property_tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Any sequence of framed records reads back identically and in order.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_stream_preserves_records(
            records in prop::collection::vec(
                (any::<u64>(), prop::collection::vec(any::<u8>(), 0..64), any::<u32>()),
                0..32
            )
        ) {
            let mut buf = Vec::new();
            for (key, body, expire) in &records {
                encode_record(&mut buf, &DumpEntry { key: *key, body: body.clone(), expire: *expire }).unwrap();
            }
            let mut cur = Cursor::new(buf);
            for (key, body, expire) in &records {
                let got = read_record(&mut cur, DEFAULT_MAX_BODY).unwrap().unwrap();
                prop_assert_eq!(got.key, *key);
                prop_assert_eq!(&got.body, body);
                prop_assert_eq!(got.expire, *expire);
            }
            prop_assert!(read_record(&mut cur, DEFAULT_MAX_BODY).unwrap().is_none());
        }

        /// Arbitrary bytes never panic the decoder.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_arbitrary_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut cur = Cursor::new(bytes);
            while let Ok(Some(_)) = read_record(&mut cur, 128) {}
        }
    }
}
