//! Error types for the put path.
//!
//! Admission declines are *not* errors; they come back as
//! [`PutOutcome::Declined`](crate::region::PutOutcome::Declined). Everything
//! here is a hard failure that propagates to the caller.

use bytes::Bytes;
use thiserror::Error;

/// Errors raised while serializing a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value exceeds the configured maximum size
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },
}

/// Errors that abort a put.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PutError {
    /// The value could not be serialized; nothing was mutated
    #[error("serialization failed: {0}")]
    Codec(#[from] CodecError),

    /// The resident value did not equal the caller's expected old value
    #[error("expected old value does not match current value of key {key:?}")]
    ExpectedValueMismatch { key: Bytes },

    /// The live entry was destroyed before the update reached it
    #[error("entry for key {key:?} was removed before it could be updated")]
    EntryRemoved { key: Bytes },

    /// Create-only and update-only were both requested
    #[error("a put cannot be both create-only and update-only")]
    ConflictingIntent,

    /// A post-commit hook failed; the entry itself is already committed
    #[error("commit callback failed: {message}")]
    Callback { message: String },
}

/// Result type for put operations.
pub type PutResult<T> = Result<T, PutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_converts() {
        let err: PutError = CodecError::ValueTooLarge { size: 10, max: 4 }.into();
        assert_eq!(
            err.to_string(),
            "serialization failed: value too large: 10 bytes (max: 4)"
        );
    }

    #[test]
    fn test_mismatch_message_names_key() {
        let err = PutError::ExpectedValueMismatch {
            key: Bytes::from("user:1"),
        };
        assert!(err.to_string().contains("user:1"));
    }
}
