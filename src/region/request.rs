//! Put requests.

use crate::region::error::{PutError, PutResult};
use bytes::Bytes;

/// The caller's hint about what kind of mutation this is.
///
/// Informational only: admission is decided by the intent flags and the
/// table state. An [`EntryEvent`](crate::region::EntryEvent) rewrites it to
/// whatever path was actually taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// A single-key mutation request.
///
/// # Example
///
/// ```
/// use flashregion::region::{Operation, PutRequest};
/// use bytes::Bytes;
///
/// let request = PutRequest::new(Bytes::from("key"), Bytes::from("value")).create_only();
/// assert!(request.create_only);
/// assert_eq!(request.operation, Operation::Create);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub key: Bytes,
    pub new_value: Bytes,
    pub operation: Operation,
    /// Only succeed if no live entry exists (ifNew)
    pub create_only: bool,
    /// Only succeed if a live entry exists (ifOld)
    pub update_only: bool,
    /// Let an update-only put create over a missing or destroyed entry
    pub overwrite_destroyed: bool,
    /// Capture the value being replaced
    pub require_old_value: bool,
    /// Only update if the current value equals this
    pub expected_old_value: Option<Bytes>,
}

impl PutRequest {
    /// Creates a plain upsert request.
    pub fn new(key: Bytes, new_value: Bytes) -> Self {
        Self {
            key,
            new_value,
            operation: Operation::Update,
            create_only: false,
            update_only: false,
            overwrite_destroyed: false,
            require_old_value: false,
            expected_old_value: None,
        }
    }

    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self.operation = Operation::Create;
        self
    }

    pub fn update_only(mut self) -> Self {
        self.update_only = true;
        self.operation = Operation::Update;
        self
    }

    pub fn overwrite_destroyed(mut self) -> Self {
        self.overwrite_destroyed = true;
        self
    }

    pub fn require_old_value(mut self) -> Self {
        self.require_old_value = true;
        self
    }

    /// Only update a live entry whose value equals `expected`.
    ///
    /// Does not imply `update_only`: without it a put on a missing or
    /// destroyed entry still creates one.
    pub fn expect_old_value(mut self, expected: Bytes) -> Self {
        self.expected_old_value = Some(expected);
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Rejects flag combinations that have no defined meaning.
    pub fn validate(&self) -> PutResult<()> {
        if self.create_only && self.update_only {
            return Err(PutError::ConflictingIntent);
        }
        Ok(())
    }
}
