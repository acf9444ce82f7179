//! Payload encoders and decoders for dumps.
//!
//! The cache is generic over its payload type and never inspects it; the
//! encoder/decoder pair supplied in the configuration is the only place where
//! payload-specific logic lives.
//!
//! ## Implementations
//!
//! | Type           | Payload bound                 | Feature   |
//! |----------------|-------------------------------|-----------|
//! | `JsonEndec`    | `Serialize + DeserializeOwned`| `json`    |
//! | `BincodeEndec` | `Serialize + DeserializeOwned`| `bincode` |
//! | `MessageEndec` | `MarshalTo + Unmarshal`       | always    |

#[cfg(feature = "bincode")]
pub mod bincode;
#[cfg(feature = "json")]
pub mod json;
pub mod message;

use crate::error::EndecError;

#[cfg(feature = "bincode")]
pub use self::bincode::BincodeEndec;
#[cfg(feature = "json")]
pub use self::json::JsonEndec;
pub use self::message::{MarshalTo, MessageEndec, Unmarshal};

/// Serializes payloads into dump record bodies.
pub trait Encoder<T>: Send + Sync {
    /// Appends the encoded `value` to `dst` and returns the number of bytes
    /// appended. On error `dst` holds no partial output.
    fn encode(&self, dst: &mut Vec<u8>, value: &T) -> Result<usize, EndecError>;
}

/// Deserializes dump record bodies back into payloads.
pub trait Decoder<T>: Send + Sync {
    fn decode(&self, src: &[u8]) -> Result<T, EndecError>;
}
