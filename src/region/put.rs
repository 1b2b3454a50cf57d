//! Put Admission
//!
//! [`PutOperation`] decides, for one key, whether a put creates a new slot,
//! updates the resident one in place, or is declined, and then runs the
//! commit hooks for whatever it admitted.
//!
//! ## Decision Table
//!
//! ```text
//!  lookup(key)            create_only        update_only(*)     neither
//!  ─────────────────────  ─────────────────  ─────────────────  ─────────
//!  Live                   decline            UPDATE             UPDATE
//!  Transitional/Cemented  CREATE             decline            CREATE
//!  missing                CREATE             decline            CREATE
//!
//!  (*) without overwrite_destroyed; with it, update_only behaves like "neither"
//!      for destroyed or missing entries.
//! ```
//!
//! ## CREATE
//!
//! The candidate slot is offered to `insert_if_absent`. If the table already
//! holds a cemented tombstone for the key, the creator removes that exact
//! tombstone and offers the same candidate again. Any other conflict (a live
//! slot, or one mid-destroy) means someone else won and the put is declined.
//!
//! ## Commit
//!
//! Only admitted puts reach the commit phase, which runs both region hooks
//! while holding the modification lock in shared mode. A decline never
//! touches the event, the lock or the hooks.

use crate::entry::{EntrySlot, EntryTable, SlotState};
use crate::region::codec::ValueCodec;
use crate::region::config::DEFAULT_RETRY_WARN_THRESHOLD;
use crate::region::context::{PutCommit, RegionContext};
use crate::region::error::PutResult;
use crate::region::event::EventRecord;
use crate::region::lock::{CacheModificationLock, ModificationGuard};
use crate::region::request::PutRequest;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Result of a put.
#[derive(Debug, Clone)]
pub enum PutOutcome {
    /// A new slot was installed
    Created(Arc<EntrySlot>),
    /// The resident slot was updated in place
    Updated(Arc<EntrySlot>),
    /// Admission declined; nothing was mutated
    Declined,
}

impl PutOutcome {
    /// The admitted slot, or `None` for a decline.
    pub fn slot(&self) -> Option<&Arc<EntrySlot>> {
        match self {
            PutOutcome::Created(slot) | PutOutcome::Updated(slot) => Some(slot),
            PutOutcome::Declined => None,
        }
    }

    pub fn into_slot(self) -> Option<Arc<EntrySlot>> {
        match self {
            PutOutcome::Created(slot) | PutOutcome::Updated(slot) => Some(slot),
            PutOutcome::Declined => None,
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, PutOutcome::Declined)
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PutOutcome::Created(_))
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, PutOutcome::Updated(_))
    }
}

/// What the lookup says the put should do.
enum Admission {
    Create,
    Update(Arc<EntrySlot>),
    Decline(&'static str),
}

/// The put-admission protocol over a set of collaborators.
pub struct PutOperation<'a> {
    table: &'a dyn EntryTable,
    codec: &'a dyn ValueCodec,
    lock: &'a dyn CacheModificationLock,
    retry_warn_threshold: u32,
}

impl<'a> PutOperation<'a> {
    pub fn new(
        table: &'a dyn EntryTable,
        codec: &'a dyn ValueCodec,
        lock: &'a dyn CacheModificationLock,
    ) -> Self {
        Self {
            table,
            codec,
            lock,
            retry_warn_threshold: DEFAULT_RETRY_WARN_THRESHOLD,
        }
    }

    /// Sets how many tombstone retries one put makes before logging a warning.
    pub fn with_retry_warn_threshold(mut self, threshold: u32) -> Self {
        self.retry_warn_threshold = threshold;
        self
    }

    /// Runs the put described by `event`.
    ///
    /// # Returns
    ///
    /// - `Ok(Created | Updated)` once the slot is resident and both commit
    ///   hooks have run
    /// - `Ok(Declined)` when admission was refused, or a concurrent put or
    ///   destroy won the key after admission; no slot was changed
    /// - `Err(_)` when serialization, the event, or a commit hook failed. A
    ///   hook failure leaves the slot committed.
    pub fn execute(
        &self,
        ctx: &RegionContext<'_>,
        event: &mut dyn EventRecord,
    ) -> PutResult<PutOutcome> {
        let request = event.request().clone();
        request.validate()?;

        let clear_generation = self.table.clear_generation();

        let (slot, created) = match self.admit(&request) {
            Admission::Decline(reason) => {
                debug!(region = ctx.name(), key = ?request.key, reason, "put declined");
                return Ok(PutOutcome::Declined);
            }
            Admission::Create => {
                let value = self.codec.serialize(&request)?;
                match self.create(ctx, event, &request, value)? {
                    Some(slot) => (slot, true),
                    None => return Ok(self.lost_create_race(ctx, &request)),
                }
            }
            Admission::Update(slot) => {
                let value = self.codec.serialize(&request)?;
                let applied = event.put_existing_entry(
                    ctx,
                    &slot,
                    value.clone(),
                    request.require_old_value,
                    request.expected_old_value.as_ref(),
                )?;

                if applied {
                    (slot, false)
                } else if request.update_only && !request.overwrite_destroyed {
                    debug!(
                        region = ctx.name(),
                        key = ?request.key,
                        "put declined: entry destroyed before update"
                    );
                    return Ok(PutOutcome::Declined);
                } else {
                    // Destroyed under us; nothing was required of the old value
                    match self.create(ctx, event, &request, value)? {
                        Some(slot) => (slot, true),
                        None => return Ok(self.lost_create_race(ctx, &request)),
                    }
                }
            }
        };

        let clear_conflict = self.table.clear_generation() != clear_generation;
        self.commit(ctx, &*event, &request, &slot, clear_conflict)?;

        Ok(if created {
            PutOutcome::Created(slot)
        } else {
            PutOutcome::Updated(slot)
        })
    }

    fn admit(&self, request: &PutRequest) -> Admission {
        let update_blocked = request.update_only && !request.overwrite_destroyed;

        match self.table.lookup(&request.key) {
            Some(slot) => match slot.state() {
                SlotState::Live(_) if request.create_only => {
                    Admission::Decline("create-only put found a live entry")
                }
                SlotState::Live(_) => Admission::Update(slot),
                SlotState::TombstoneTransitional | SlotState::TombstoneCemented
                    if update_blocked =>
                {
                    Admission::Decline("update-only put found a destroyed entry")
                }
                SlotState::TombstoneTransitional | SlotState::TombstoneCemented => {
                    Admission::Create
                }
            },
            None if update_blocked => Admission::Decline("update-only put found no entry"),
            None => Admission::Create,
        }
    }

    fn lost_create_race(&self, ctx: &RegionContext<'_>, request: &PutRequest) -> PutOutcome {
        debug!(
            region = ctx.name(),
            key = ?request.key,
            "put declined: lost the create race"
        );
        PutOutcome::Declined
    }

    /// Installs a new slot holding `value`. Returns `None` if a live or
    /// mid-destroy slot won.
    fn create(
        &self,
        ctx: &RegionContext<'_>,
        event: &mut dyn EventRecord,
        request: &PutRequest,
        value: Bytes,
    ) -> PutResult<Option<Arc<EntrySlot>>> {
        let key = &request.key;
        let candidate = self.table.entry_factory().create_entry(key.clone(), value);

        let mut retries: u32 = 0;
        while let Some(conflict) = self.table.insert_if_absent(key.clone(), Arc::clone(&candidate))
        {
            if !conflict.is_removed_phase2() {
                return Ok(None);
            }

            retries += 1;
            ctx.stats().inc_retries();
            self.table.remove_if_same(key, &conflict);

            trace!(region = ctx.name(), key = ?key, retries, "create hit a cemented tombstone");
            if retries == self.retry_warn_threshold {
                warn!(
                    region = ctx.name(),
                    key = ?key,
                    retries,
                    "create keeps colliding with cemented tombstones"
                );
            }
        }

        if let Err(err) = event.put_new_entry(ctx, &candidate) {
            self.abandon(key, &candidate);
            return Err(err);
        }

        Ok(Some(candidate))
    }

    /// Retires a candidate that was installed but never bound to its event.
    ///
    /// A candidate that a concurrent put already updated in place now carries
    /// that put's value, so it is left resident.
    fn abandon(&self, key: &Bytes, candidate: &Arc<EntrySlot>) {
        if !candidate.mark_removed_phase1_if_unmodified() {
            debug!(key = ?key, "abandoned candidate kept: updated concurrently");
            return;
        }
        candidate.mark_removed_phase2();
        self.table.remove_if_same(key, candidate);
    }

    fn commit(
        &self,
        ctx: &RegionContext<'_>,
        event: &dyn EventRecord,
        request: &PutRequest,
        slot: &Arc<EntrySlot>,
        clear_conflict: bool,
    ) -> PutResult<()> {
        let _guard = ModificationGuard::acquire(self.lock);

        let mut commit = PutCommit {
            is_initialized: ctx.is_initialized(),
            last_modified: ctx.now(),
            clear_conflict,
            invoke_callbacks: true,
            create_only: request.create_only,
            update_only: request.update_only,
            require_old_value: request.require_old_value,
            expected_old_value: request.expected_old_value.as_ref(),
        };

        if clear_conflict {
            debug!(region = ctx.name(), key = ?request.key, "put overlapped a region clear");
        }

        commit.last_modified = ctx.callback().basic_put_part2(event, slot, &commit)?;
        ctx.callback().basic_put_part3(event, slot, &commit)
    }
}
