//! # FlashRegion - Concurrent In-Memory Regions with Safe Put Admission
//!
//! FlashRegion is an in-memory key-value region written in Rust. Its core is
//! the put path: deciding whether a put may create a new entry, update an
//! existing one, or must be declined, while destroys and clears run
//! concurrently against the same keys.
//!
//! ## Features
//!
//! - **Create-only / update-only puts**: `putIfAbsent` and `replace` style
//!   semantics without a global lock
//! - **Conditional replace**: update only when the current value matches
//! - **Two-phase tombstones**: a destroyed slot is transitional, then cemented,
//!   then unmapped; creates step over cemented tombstones safely
//! - **Sharded storage**: 64 independent RwLocks by default
//! - **Commit hooks**: statistics, timestamps and listeners run under a shared
//!   modification lock that `clear` takes exclusively
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashRegion                                │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ PutRequest  │───>│  EntryEvent │───>│PutOperation │                  │
//! │  │  (flags)    │    │             │    │ (admission) │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │  Value      │    │            ShardedEntryTable                 │   │
//! │  │  Codec      │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌─────────────────────────────────────────────────┐ │
//! │                     │   LocalRegion commit hooks (part 2, part 3)     │ │
//! │                     │   under RegionModificationLock                  │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashregion::region::{LocalRegion, PutRequest, RegionConfig};
//! use bytes::Bytes;
//!
//! let region = LocalRegion::new(RegionConfig::named("sessions"));
//! let key = Bytes::from("user:1");
//!
//! // putIfAbsent
//! let outcome = region.create(key.clone(), Bytes::from("alice")).unwrap();
//! assert!(outcome.is_created());
//!
//! // replace(key, expected, new)
//! let old = region
//!     .replace_if_equal(key.clone(), Bytes::from("alice"), Bytes::from("bob"))
//!     .unwrap();
//! assert_eq!(old, Some(Bytes::from("alice")));
//!
//! // Explicit request with several flags
//! let request = PutRequest::new(key.clone(), Bytes::from("carol"))
//!     .update_only()
//!     .require_old_value();
//! assert!(region.execute(request).unwrap().is_updated());
//! ```
//!
//! ## Module Overview
//!
//! - [`entry`]: Entry slots, their lifecycle, and the sharded table
//! - [`region`]: The put-admission protocol and the local region
//!
//! ## Design Highlights
//!
//! ### Slot Identity
//!
//! Puts never compare slots by key. A create succeeds only if the slot it
//! installed is the one now mapped, and tombstone cleanup removes a mapping
//! only if it still points at that exact slot.
//!
//! ### Serialize Before Mutate
//!
//! The value is serialized after the lookup admits the put and before any slot
//! is touched, so a put declined at lookup never pays for serialization and a
//! failing codec never leaves a partial entry behind. A create that then loses
//! the insert race has already serialized its value.
//!
//! ### Scoped Locking
//!
//! The commit phase holds the modification lock through a guard that is
//! released in `Drop`, so hook failures cannot leak the lock.

pub mod entry;
pub mod region;

// Re-export commonly used types for convenience
pub use entry::{EntrySlot, EntryTable, ShardedEntryTable, SlotState};
pub use region::{
    CacheListener, LocalRegion, PutError, PutOperation, PutOutcome, PutRequest, RegionConfig,
};

/// Version of FlashRegion
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
