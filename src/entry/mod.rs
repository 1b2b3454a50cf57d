//! Entry Storage Module
//!
//! Slots and the table that maps keys to them.
//!
//! - [`slot`]: `EntrySlot` and its `SlotState` lifecycle enum
//! - [`table`]: the `EntryTable` contract and the sharded in-memory table
//!
//! ## Example
//!
//! ```
//! use flashregion::entry::{EntryTable, ShardedEntryTable, SlotState};
//! use bytes::Bytes;
//!
//! let table = ShardedEntryTable::new();
//! let key = Bytes::from("session");
//! let slot = table.entry_factory().create_entry(key.clone(), Bytes::from("abc123"));
//! table.insert_if_absent(key.clone(), slot);
//!
//! let resident = table.lookup(&key).unwrap();
//! assert_eq!(resident.state(), SlotState::Live(Bytes::from("abc123")));
//! ```

pub mod slot;
pub mod table;

// Re-export commonly used types
pub use slot::{EntrySlot, SlotConflict, SlotState};
pub use table::{EntryFactory, EntryTable, LiveEntryFactory, ShardedEntryTable, DEFAULT_SHARDS};
