//! Entry Slots
//!
//! An `EntrySlot` is the unit of storage for one key: the current value plus
//! its lifecycle token. Slots are shared as `Arc<EntrySlot>` so that "the same
//! slot" can be recognised across calls by handle identity (`Arc::ptr_eq`).
//!
//! ## Lifecycle
//!
//! ```text
//!   CREATE path                destroy path                  destroy path
//!  ─────────────> Live(value) ─────────────> Transitional ─────────────> Cemented
//!                   │    ▲                  (mid-destroy)             (tombstone, safe
//!                   └────┘                                             to supersede)
//!                UPDATE path
//!              (value only, same
//!               slot identity)
//! ```
//!
//! Transitions are one-way. A cemented tombstone is never revived; a new
//! create supersedes it by installing a different slot under the same key.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// The value and lifecycle token of a slot, as one closed enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// The slot holds a live value.
    Live(Bytes),
    /// The slot is mid-destroy (REMOVED_PHASE1). Not yet safe to supersede.
    TombstoneTransitional,
    /// The slot is a cemented tombstone (REMOVED_PHASE2). Safe to supersede.
    TombstoneCemented,
}

impl SlotState {
    /// Returns true for either tombstone phase.
    #[inline]
    pub fn is_removed(&self) -> bool {
        !matches!(self, SlotState::Live(_))
    }
}

/// Why an in-place compare-and-set on a slot was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotConflict {
    /// The slot was destroyed after it was looked up.
    Removed,
    /// The current value differs from the expected one.
    ValueMismatch,
}

/// The stored key/value unit for one key.
#[derive(Debug)]
pub struct EntrySlot {
    /// The key this slot was created for
    key: Bytes,
    /// Value and lifecycle token
    state: RwLock<SlotState>,
    /// When this slot was created
    created_at: Instant,
    /// Milliseconds since the epoch, stamped by the commit phase
    last_modified: AtomicU64,
    /// Number of in-place updates applied to this slot
    version: AtomicU64,
}

impl EntrySlot {
    /// Creates a new live slot.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self {
            key,
            state: RwLock::new(SlotState::Live(value)),
            created_at: Instant::now(),
            last_modified: AtomicU64::new(0),
            version: AtomicU64::new(0),
        }
    }

    /// Returns the key of this slot.
    #[inline]
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Returns a snapshot of the current state.
    ///
    /// Cloning the state only bumps the reference count of the value.
    pub fn state(&self) -> SlotState {
        self.state.read().clone()
    }

    /// Returns the live value, or `None` for a tombstone.
    pub fn value(&self) -> Option<Bytes> {
        match &*self.state.read() {
            SlotState::Live(value) => Some(value.clone()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.state.read().is_removed()
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.state.read().is_removed()
    }

    #[inline]
    pub fn is_removed_phase2(&self) -> bool {
        matches!(*self.state.read(), SlotState::TombstoneCemented)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified.load(Ordering::Acquire)
    }

    pub fn set_last_modified(&self, millis: u64) {
        self.last_modified.store(millis, Ordering::Release);
    }

    /// Returns how many in-place updates this slot has seen.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Atomically replaces the live value, returning the previous one.
    ///
    /// When `expected` is given the swap only happens if the current value is
    /// byte-equal to it. A tombstoned slot is never written.
    pub fn compare_and_set(
        &self,
        expected: Option<&Bytes>,
        new_value: Bytes,
    ) -> Result<Bytes, SlotConflict> {
        let mut state = self.state.write();

        let current = match &mut *state {
            SlotState::Live(current) => current,
            SlotState::TombstoneTransitional | SlotState::TombstoneCemented => {
                return Err(SlotConflict::Removed);
            }
        };

        if let Some(expected) = expected {
            if *current != *expected {
                return Err(SlotConflict::ValueMismatch);
            }
        }

        let old = std::mem::replace(current, new_value);
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(old)
    }

    /// Starts a destroy: Live -> Transitional.
    ///
    /// Returns the value the slot held, or `None` if the slot was already
    /// being destroyed.
    pub fn mark_removed_phase1(&self) -> Option<Bytes> {
        let mut state = self.state.write();
        match std::mem::replace(&mut *state, SlotState::TombstoneTransitional) {
            SlotState::Live(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Starts a destroy only if the slot has never been updated in place.
    ///
    /// Returns false, leaving the slot alone, if it is not live or if an
    /// update has already been applied to it.
    pub fn mark_removed_phase1_if_unmodified(&self) -> bool {
        let mut state = self.state.write();
        if state.is_removed() || self.version.load(Ordering::Acquire) != 0 {
            return false;
        }
        *state = SlotState::TombstoneTransitional;
        true
    }

    /// Cements a destroy: Transitional -> Cemented.
    ///
    /// Returns false if the slot was not in the transitional phase.
    pub fn mark_removed_phase2(&self) -> bool {
        let mut state = self.state.write();
        if *state == SlotState::TombstoneTransitional {
            *state = SlotState::TombstoneCemented;
            true
        } else {
            false
        }
    }
}
