//! Entry Events
//!
//! An event carries the caller's [`PutRequest`] through the put path and
//! records what happened to it. The put path hands the event the slot it
//! admitted; the event is the single place where the expected old value is
//! enforced and the previous value is captured.

use crate::entry::{EntrySlot, SlotConflict};
use crate::region::context::RegionContext;
use crate::region::error::{PutError, PutResult};
use crate::region::request::{Operation, PutRequest};
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

/// Which admission path a put took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPath {
    /// A new slot was installed
    Created,
    /// An existing live slot was updated in place
    Updated,
}

/// The event side of a put, as seen by the admission protocol.
pub trait EventRecord {
    fn request(&self) -> &PutRequest;

    fn operation(&self) -> Operation;

    fn key(&self) -> &Bytes {
        &self.request().key
    }

    /// The value replaced by an update, when it was captured.
    fn old_value(&self) -> Option<&Bytes>;

    /// Binds a freshly installed slot to this event.
    ///
    /// The slot is already visible in the table when this runs, so a
    /// concurrent put may update it in place first. If this fails, the put
    /// path retires the slot only when no such update has landed.
    fn put_new_entry(&mut self, ctx: &RegionContext<'_>, slot: &Arc<EntrySlot>) -> PutResult<()>;

    /// Applies `value` to an existing live slot.
    ///
    /// Returns `Ok(false)` without touching the slot if it was destroyed after
    /// lookup and the caller asked for neither the old value nor a match.
    ///
    /// Fails if `expected_old_value` is given and does not match, or if the
    /// slot was destroyed while its old value or a match was required.
    fn put_existing_entry(
        &mut self,
        ctx: &RegionContext<'_>,
        slot: &Arc<EntrySlot>,
        value: Bytes,
        require_old_value: bool,
        expected_old_value: Option<&Bytes>,
    ) -> PutResult<bool>;
}

/// The standard [`EventRecord`].
#[derive(Debug, Clone)]
pub struct EntryEvent {
    request: PutRequest,
    operation: Operation,
    path: Option<AdmissionPath>,
    old_value: Option<Bytes>,
}

impl EntryEvent {
    pub fn new(request: PutRequest) -> Self {
        let operation = request.operation;
        Self {
            request,
            operation,
            path: None,
            old_value: None,
        }
    }

    /// The path taken, or `None` if the put was declined or failed.
    pub fn path(&self) -> Option<AdmissionPath> {
        self.path
    }

    pub fn take_old_value(&mut self) -> Option<Bytes> {
        self.old_value.take()
    }
}

impl EventRecord for EntryEvent {
    fn request(&self) -> &PutRequest {
        &self.request
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn old_value(&self) -> Option<&Bytes> {
        self.old_value.as_ref()
    }

    fn put_new_entry(&mut self, ctx: &RegionContext<'_>, slot: &Arc<EntrySlot>) -> PutResult<()> {
        self.operation = Operation::Create;
        self.path = Some(AdmissionPath::Created);
        self.old_value = None;

        trace!(region = ctx.name(), key = ?slot.key(), "new entry bound to event");
        Ok(())
    }

    fn put_existing_entry(
        &mut self,
        ctx: &RegionContext<'_>,
        slot: &Arc<EntrySlot>,
        value: Bytes,
        require_old_value: bool,
        expected_old_value: Option<&Bytes>,
    ) -> PutResult<bool> {
        let old = match slot.compare_and_set(expected_old_value, value) {
            Ok(old) => old,
            Err(SlotConflict::ValueMismatch) => {
                return Err(PutError::ExpectedValueMismatch {
                    key: self.request.key.clone(),
                });
            }
            Err(SlotConflict::Removed) if require_old_value || expected_old_value.is_some() => {
                return Err(PutError::EntryRemoved {
                    key: self.request.key.clone(),
                });
            }
            Err(SlotConflict::Removed) => {
                trace!(
                    region = ctx.name(),
                    key = ?slot.key(),
                    "existing entry destroyed before update"
                );
                return Ok(false);
            }
        };

        self.operation = Operation::Update;
        self.path = Some(AdmissionPath::Updated);
        self.old_value = require_old_value.then_some(old);

        trace!(
            region = ctx.name(),
            key = ?slot.key(),
            version = slot.version(),
            "existing entry updated"
        );
        Ok(true)
    }
}
