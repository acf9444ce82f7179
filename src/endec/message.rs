use crate::endec::{Decoder, Encoder};
use crate::error::EndecError;

/// Payloads that serialize themselves into a caller-provided buffer.
///
/// Intended for generated message types (protobuf-style `MarshalTo`) and for
/// hand-written zero-copy formats.
pub trait MarshalTo {
    /// Exact encoded size, used to reserve the destination buffer.
    fn size(&self) -> usize;

    /// Appends the serialized form to `dst`, returning the bytes written.
    fn marshal_to(&self, dst: &mut Vec<u8>) -> Result<usize, EndecError>;
}

/// Payloads that parse themselves from bytes.
pub trait Unmarshal: Sized {
    fn unmarshal(src: &[u8]) -> Result<Self, EndecError>;
}

/// Encoder/decoder delegating to the payload's own [`MarshalTo`] and
/// [`Unmarshal`] implementations.
///
/// Payload types lacking those capabilities are rejected at compile time.
///
/// ```
/// use ttlkit::endec::{Decoder, Encoder, MessageEndec};
///
/// let mut buf = Vec::new();
/// MessageEndec.encode(&mut buf, &b"raw".to_vec()).unwrap();
/// let back: Vec<u8> = MessageEndec.decode(&buf).unwrap();
/// assert_eq!(back, b"raw");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageEndec;

impl<T: MarshalTo> Encoder<T> for MessageEndec {
    fn encode(&self, dst: &mut Vec<u8>, value: &T) -> Result<usize, EndecError> {
        let start = dst.len();
        dst.reserve(value.size());
        value.marshal_to(dst).inspect_err(|_| dst.truncate(start))
    }
}

impl<T: Unmarshal> Decoder<T> for MessageEndec {
    fn decode(&self, src: &[u8]) -> Result<T, EndecError> {
        T::unmarshal(src)
    }
}

impl MarshalTo for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn marshal_to(&self, dst: &mut Vec<u8>) -> Result<usize, EndecError> {
        dst.extend_from_slice(self);
        Ok(self.len())
    }
}

impl Unmarshal for Vec<u8> {
    fn unmarshal(src: &[u8]) -> Result<Self, EndecError> {
        Ok(src.to_vec())
    }
}

impl MarshalTo for String {
    fn size(&self) -> usize {
        self.len()
    }

    fn marshal_to(&self, dst: &mut Vec<u8>) -> Result<usize, EndecError> {
        dst.extend_from_slice(self.as_bytes());
        Ok(self.len())
    }
}

impl Unmarshal for String {
    fn unmarshal(src: &[u8]) -> Result<Self, EndecError> {
        String::from_utf8(src.to_vec()).map_err(|err| EndecError::Decode(Box::new(err)))
    }
}
