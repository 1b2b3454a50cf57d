//! Sharded Entry Table
//!
//! The keyed collection of slots. The admission protocol only relies on the
//! [`EntryTable`] trait: an atomic lookup, an atomic conditional insert, and a
//! conditional remove. [`ShardedEntryTable`] is the in-memory implementation.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ShardedEntryTable                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key always hashes to the same shard, so every operation on one key is
//! serialized by that shard's lock. That is what makes `insert_if_absent`
//! linearizable per key: on success the new slot is visible to every later
//! lookup, on failure the returned slot is what the map held at that instant.
//!
//! Tombstones stay in the map until whoever cemented them (or a creator that
//! ran into them) removes them with `remove_if_same`.

use crate::entry::slot::EntrySlot;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 64;

/// Builds candidate slots for the CREATE path.
pub trait EntryFactory: Send + Sync {
    fn create_entry(&self, key: Bytes, value: Bytes) -> Arc<EntrySlot>;
}

/// Produces plain live slots.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveEntryFactory;

impl EntryFactory for LiveEntryFactory {
    fn create_entry(&self, key: Bytes, value: Bytes) -> Arc<EntrySlot> {
        Arc::new(EntrySlot::new(key, value))
    }
}

/// The keyed collection of slots consulted by the admission protocol.
pub trait EntryTable: Send + Sync {
    /// Returns whatever slot is mapped to `key`, tombstones included.
    fn lookup(&self, key: &Bytes) -> Option<Arc<EntrySlot>>;

    /// Maps `key` to `slot` unless a mapping already exists.
    ///
    /// Returns `None` when `slot` was installed, otherwise the conflicting slot.
    fn insert_if_absent(&self, key: Bytes, slot: Arc<EntrySlot>) -> Option<Arc<EntrySlot>>;

    /// Removes the mapping for `key` only if it is exactly `slot`.
    fn remove_if_same(&self, key: &Bytes, slot: &Arc<EntrySlot>) -> bool;

    /// The factory used to build candidate slots.
    fn entry_factory(&self) -> &dyn EntryFactory;

    /// Incremented every time the whole table is cleared.
    fn clear_generation(&self) -> u64;
}

/// A single shard containing a portion of the slots.
#[derive(Debug, Default)]
struct Shard {
    slots: RwLock<HashMap<Bytes, Arc<EntrySlot>>>,
}

/// In-memory [`EntryTable`] split into independently locked shards.
///
/// # Example
///
/// ```
/// use flashregion::entry::{EntryTable, ShardedEntryTable};
/// use bytes::Bytes;
///
/// let table = ShardedEntryTable::new();
/// let key = Bytes::from("name");
/// let slot = table.entry_factory().create_entry(key.clone(), Bytes::from("Ariz"));
///
/// assert!(table.insert_if_absent(key.clone(), slot).is_none());
/// assert_eq!(table.lookup(&key).and_then(|s| s.value()), Some(Bytes::from("Ariz")));
/// ```
pub struct ShardedEntryTable {
    shards: Vec<Shard>,
    factory: Box<dyn EntryFactory>,
    clear_generation: AtomicU64,
}

impl std::fmt::Debug for ShardedEntryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedEntryTable")
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .field(
                "clear_generation",
                &self.clear_generation.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl Default for ShardedEntryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedEntryTable {
    /// Creates a table with [`DEFAULT_SHARDS`] shards.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Creates a table with the given number of shards (at least one).
    pub fn with_shards(shards: usize) -> Self {
        Self::with_factory(shards, Box::new(LiveEntryFactory))
    }

    /// Creates a table that builds candidate slots with a custom factory.
    pub fn with_factory(shards: usize, factory: Box<dyn EntryFactory>) -> Self {
        let shards = (0..shards.max(1)).map(|_| Shard::default()).collect();

        Self {
            shards,
            factory,
            clear_generation: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Number of mappings, tombstones included.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.slots.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.slots.read().is_empty())
    }

    /// Number of mappings whose slot is live.
    pub fn live_len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.slots.read().values().filter(|slot| slot.is_live()).count())
            .sum()
    }

    /// Returns the keys of all live slots.
    ///
    /// **Warning**: This scans every shard.
    pub fn keys(&self) -> Vec<Bytes> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let slots = shard.slots.read();
            result.extend(
                slots
                    .iter()
                    .filter(|(_, slot)| slot.is_live())
                    .map(|(key, _)| key.clone()),
            );
        }
        result
    }

    /// Drops every mapping and bumps the clear generation.
    ///
    /// Returns the number of mappings removed.
    pub fn clear(&self) -> usize {
        // Bump first so puts that straddle the clear observe it.
        self.clear_generation.fetch_add(1, Ordering::AcqRel);

        let mut removed = 0;
        for shard in &self.shards {
            let mut slots = shard.slots.write();
            removed += slots.len();
            slots.clear();
        }
        removed
    }
}

impl EntryTable for ShardedEntryTable {
    fn lookup(&self, key: &Bytes) -> Option<Arc<EntrySlot>> {
        self.get_shard(key).slots.read().get(key).cloned()
    }

    fn insert_if_absent(&self, key: Bytes, slot: Arc<EntrySlot>) -> Option<Arc<EntrySlot>> {
        let mut slots = self.get_shard(&key).slots.write();
        match slots.entry(key) {
            Entry::Occupied(existing) => Some(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                None
            }
        }
    }

    fn remove_if_same(&self, key: &Bytes, slot: &Arc<EntrySlot>) -> bool {
        let mut slots = self.get_shard(key).slots.write();
        match slots.get(key) {
            Some(current) if Arc::ptr_eq(current, slot) => {
                slots.remove(key);
                true
            }
            _ => false,
        }
    }

    fn entry_factory(&self) -> &dyn EntryFactory {
        self.factory.as_ref()
    }

    fn clear_generation(&self) -> u64 {
        self.clear_generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(key: &'static str, value: &'static str) -> Arc<EntrySlot> {
        Arc::new(EntrySlot::new(Bytes::from(key), Bytes::from(value)))
    }

    #[test]
    fn test_lookup_missing() {
        let table = ShardedEntryTable::new();
        assert!(table.lookup(&Bytes::from("missing")).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_if_absent_installs_once() {
        let table = ShardedEntryTable::new();
        let key = Bytes::from("key");
        let first = live("key", "first");
        let second = live("key", "second");

        assert!(table.insert_if_absent(key.clone(), Arc::clone(&first)).is_none());

        let conflict = table.insert_if_absent(key.clone(), second);
        assert!(conflict.is_some_and(|c| Arc::ptr_eq(&c, &first)));

        let resident = table.lookup(&key).unwrap();
        assert!(Arc::ptr_eq(&resident, &first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_tombstone_is_a_conflict() {
        let table = ShardedEntryTable::new();
        let key = Bytes::from("key");
        let tombstone = live("key", "value");
        table.insert_if_absent(key.clone(), Arc::clone(&tombstone));
        tombstone.mark_removed_phase1();
        tombstone.mark_removed_phase2();

        let conflict = table.insert_if_absent(key.clone(), live("key", "new"));
        assert!(conflict.is_some_and(|c| c.is_removed_phase2()));

        // Still counted as a mapping, but not as a live key
        assert_eq!(table.len(), 1);
        assert_eq!(table.live_len(), 0);
        assert!(table.keys().is_empty());
    }

    #[test]
    fn test_remove_if_same() {
        let table = ShardedEntryTable::new();
        let key = Bytes::from("key");
        let resident = live("key", "value");
        let stranger = live("key", "value");
        table.insert_if_absent(key.clone(), Arc::clone(&resident));

        // Equal contents, different identity
        assert!(!table.remove_if_same(&key, &stranger));
        assert!(table.lookup(&key).is_some());

        assert!(table.remove_if_same(&key, &resident));
        assert!(table.lookup(&key).is_none());
        assert!(!table.remove_if_same(&key, &resident));
    }

    #[test]
    fn test_clear_bumps_generation() {
        let table = ShardedEntryTable::with_shards(4);
        for i in 0..10 {
            let key = Bytes::from(format!("key-{}", i));
            table.insert_if_absent(key.clone(), Arc::new(EntrySlot::new(key, Bytes::new())));
        }
        assert_eq!(table.len(), 10);
        assert_eq!(table.clear_generation(), 0);

        assert_eq!(table.clear(), 10);
        assert!(table.is_empty());
        assert_eq!(table.clear_generation(), 1);
    }

    #[test]
    fn test_zero_shards_is_clamped() {
        let table = ShardedEntryTable::with_shards(0);
        let key = Bytes::from("key");
        assert!(table.insert_if_absent(key.clone(), live("key", "v")).is_none());
        assert!(table.lookup(&key).is_some());
    }

    #[test]
    fn test_concurrent_insert_if_absent_single_winner() {
        use std::thread;

        let table = Arc::new(ShardedEntryTable::new());
        let key = Bytes::from("contended");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let key = key.clone();
                thread::spawn(move || {
                    let slot = Arc::new(EntrySlot::new(key.clone(), Bytes::from(format!("{}", i))));
                    table.insert_if_absent(key, slot).is_none()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(table.len(), 1);
    }
}
