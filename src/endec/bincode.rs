use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::endec::{Decoder, Encoder};
use crate::error::EndecError;

/// Compact binary encoding through `bincode` (1.x, default options).
///
/// Serialize impls bincode cannot drive, such as sequences of unknown length,
/// fail with [`EndecError::Unsupported`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeEndec;

impl<T: Serialize> Encoder<T> for BincodeEndec {
    fn encode(&self, dst: &mut Vec<u8>, value: &T) -> Result<usize, EndecError> {
        let start = dst.len();
        if let Err(err) = bincode::serialize_into(&mut *dst, value) {
            dst.truncate(start);
            let unsupported = matches!(
                *err,
                bincode::ErrorKind::SequenceMustHaveLength | bincode::ErrorKind::Custom(_)
            );
            return Err(if unsupported {
                EndecError::Unsupported(err.to_string())
            } else {
                EndecError::Encode(err)
            });
        }
        Ok(dst.len() - start)
    }
}

impl<T: DeserializeOwned> Decoder<T> for BincodeEndec {
    fn decode(&self, src: &[u8]) -> Result<T, EndecError> {
        bincode::deserialize(src).map_err(|err| EndecError::Decode(err))
    }
}
