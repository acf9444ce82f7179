use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::endec::{Decoder, Encoder};
use crate::error::EndecError;

/// JSON encoding through `serde_json`.
///
/// Payloads JSON cannot represent (maps with non-string keys, non-finite
/// floats serialized as numbers, ...) fail with [`EndecError::Unsupported`].
///
/// # Example
///
/// ```
/// use ttlkit::endec::{Decoder, Encoder, JsonEndec};
///
/// let mut buf = Vec::new();
/// let n = JsonEndec.encode(&mut buf, &vec![1u32, 2, 3]).unwrap();
/// assert_eq!(&buf[..n], b"[1,2,3]");
/// let back: Vec<u32> = JsonEndec.decode(&buf).unwrap();
/// assert_eq!(back, [1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonEndec;

impl<T: Serialize> Encoder<T> for JsonEndec {
    fn encode(&self, dst: &mut Vec<u8>, value: &T) -> Result<usize, EndecError> {
        let start = dst.len();
        if let Err(err) = serde_json::to_writer(&mut *dst, value) {
            dst.truncate(start);
            return Err(match err.classify() {
                serde_json::error::Category::Data => EndecError::Unsupported(err.to_string()),
                _ => EndecError::Encode(Box::new(err)),
            });
        }
        Ok(dst.len() - start)
    }
}

impl<T: DeserializeOwned> Decoder<T> for JsonEndec {
    fn decode(&self, src: &[u8]) -> Result<T, EndecError> {
        serde_json::from_slice(src).map_err(|err| EndecError::Decode(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u8,
    }

    #[test]
    fn appends_after_existing_bytes() {
        let mut buf = b"prefix".to_vec();
        let n = JsonEndec
            .encode(&mut buf, &Profile { name: "ann".into(), age: 30 })
            .unwrap();
        assert_eq!(n, buf.len() - 6);
        let back: Profile = JsonEndec.decode(&buf[6..]).unwrap();
        assert_eq!(back, Profile { name: "ann".into(), age: 30 });
    }

    #[test]
    fn non_string_map_keys_are_unsupported() {
        let mut map = HashMap::new();
        map.insert((1u8, 2u8), "tuple key");
        let mut buf = Vec::new();
        let err = JsonEndec.encode(&mut buf, &map).unwrap_err();
        assert!(matches!(err, EndecError::Unsupported(_)), "{err:?}");
        assert!(buf.is_empty());
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = Decoder::<Profile>::decode(&JsonEndec, b"{not json").unwrap_err();
        assert!(matches!(err, EndecError::Decode(_)));
    }
}
