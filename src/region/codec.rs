//! Value serialization ahead of slot placement.

use crate::region::config::DEFAULT_MAX_VALUE_SIZE;
use crate::region::error::CodecError;
use crate::region::request::PutRequest;
use bytes::Bytes;

/// Turns a request's value into the bytes stored in a slot.
pub trait ValueCodec: Send + Sync {
    fn serialize(&self, request: &PutRequest) -> Result<Bytes, CodecError>;
}

/// Stores values exactly as given.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl ValueCodec for IdentityCodec {
    fn serialize(&self, request: &PutRequest) -> Result<Bytes, CodecError> {
        Ok(request.new_value.clone())
    }
}

/// Stores values as given, rejecting any larger than `max_value_size`.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimitedCodec {
    max_value_size: usize,
}

impl Default for SizeLimitedCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_SIZE)
    }
}

impl SizeLimitedCodec {
    pub fn new(max_value_size: usize) -> Self {
        Self { max_value_size }
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl ValueCodec for SizeLimitedCodec {
    fn serialize(&self, request: &PutRequest) -> Result<Bytes, CodecError> {
        let size = request.new_value.len();
        if size > self.max_value_size {
            return Err(CodecError::ValueTooLarge {
                size,
                max: self.max_value_size,
            });
        }
        Ok(request.new_value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: &'static str) -> PutRequest {
        PutRequest::new(Bytes::from("key"), Bytes::from(value))
    }

    #[test]
    fn test_identity_passes_through() {
        assert_eq!(
            IdentityCodec.serialize(&request("value")),
            Ok(Bytes::from("value"))
        );
    }

    #[test]
    fn test_size_limit() {
        let codec = SizeLimitedCodec::new(5);
        assert_eq!(codec.serialize(&request("12345")), Ok(Bytes::from("12345")));
        assert_eq!(
            codec.serialize(&request("123456")),
            Err(CodecError::ValueTooLarge { size: 6, max: 5 })
        );
    }
}
