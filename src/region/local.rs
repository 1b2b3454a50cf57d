//! Local Region
//!
//! A single-member region: the sharded table plus everything the put path
//! needs around it. `LocalRegion` implements the commit hooks itself
//! (statistics, last-modified stamping and listener dispatch) and provides
//! the destroy and clear operations whose effects the put path has to cope
//! with.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         LocalRegion                          │
//! │                                                              │
//! │  put/create/replace ──> PutOperation ──> ShardedEntryTable   │
//! │                             │                                │
//! │                             ▼                                │
//! │                   RegionModificationLock (shared)            │
//! │                             │                                │
//! │                             ▼                                │
//! │             basic_put_part2 ──> basic_put_part3              │
//! │             (stats, stamp)      (listeners)                  │
//! │                                                              │
//! │  destroy ──> Live ──> Transitional ──> Cemented ──> removed  │
//! │  clear   ──> RegionModificationLock (exclusive) ──> clear    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flashregion::region::{LocalRegion, RegionConfig};
//! use bytes::Bytes;
//!
//! let region = LocalRegion::new(RegionConfig::named("users"));
//!
//! assert!(region.create(Bytes::from("name"), Bytes::from("Ariz")).unwrap().is_created());
//! assert!(region.create(Bytes::from("name"), Bytes::from("Other")).unwrap().is_declined());
//! assert_eq!(region.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
//! ```

use crate::entry::{EntrySlot, EntryTable, ShardedEntryTable};
use crate::region::codec::SizeLimitedCodec;
use crate::region::config::RegionConfig;
use crate::region::context::{Clock, PutCommit, RegionCallback, RegionContext, SystemClock};
use crate::region::error::PutResult;
use crate::region::event::{EntryEvent, EventRecord};
use crate::region::lock::{ModificationGuard, RegionModificationLock};
use crate::region::put::{PutOperation, PutOutcome};
use crate::region::request::{Operation, PutRequest};
use crate::region::stats::{CachePerfStats, PerfStats};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Receives notifications after mutations commit.
///
/// Create and update notifications run inside the commit phase while the
/// modification lock is held in shared mode. Those two callbacks must not call
/// back into the region: a nested put would wait behind any pending
/// [`LocalRegion::clear`], which in turn waits for this commit to finish.
pub trait CacheListener: Send + Sync {
    fn after_create(&self, _key: &Bytes, _value: &Bytes) {}

    fn after_update(&self, _key: &Bytes, _old_value: Option<&Bytes>, _new_value: &Bytes) {}

    fn after_destroy(&self, _key: &Bytes, _old_value: &Bytes) {}
}

/// An in-memory region on a single member.
pub struct LocalRegion {
    config: RegionConfig,
    table: ShardedEntryTable,
    codec: SizeLimitedCodec,
    modification_lock: RegionModificationLock,
    stats: CachePerfStats,
    clock: Box<dyn Clock>,
    initialized: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn CacheListener>>>,
}

impl std::fmt::Debug for LocalRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegion")
            .field("name", &self.config.name)
            .field("table", &self.table)
            .field("initialized", &self.is_initialized())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl Default for LocalRegion {
    fn default() -> Self {
        Self::new(RegionConfig::default())
    }
}

impl LocalRegion {
    /// Creates an initialized region using the system clock.
    pub fn new(config: RegionConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: RegionConfig, clock: Box<dyn Clock>) -> Self {
        let table = ShardedEntryTable::with_shards(config.shards);
        let codec = SizeLimitedCodec::new(config.max_value_size);

        debug!(region = %config.name, shards = config.shards, "region created");

        Self {
            config,
            table,
            codec,
            modification_lock: RegionModificationLock::new(),
            stats: CachePerfStats::new(),
            clock,
            initialized: AtomicBool::new(true),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// The backing table, tombstones included.
    pub fn table(&self) -> &ShardedEntryTable {
        &self.table
    }

    /// While uninitialized, puts still commit but listeners are not called.
    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }

    pub fn add_listener(&self, listener: Arc<dyn CacheListener>) {
        self.listeners.write().push(listener);
    }

    // ========================================================================
    // PUT OPERATIONS
    // ========================================================================

    /// Runs a put and returns the event it produced.
    pub fn execute_event(&self, event: &mut EntryEvent) -> PutResult<PutOutcome> {
        let ctx = RegionContext::new(self, self.clock.as_ref());
        PutOperation::new(&self.table, &self.codec, &self.modification_lock)
            .with_retry_warn_threshold(self.config.retry_warn_threshold)
            .execute(&ctx, event)
    }

    pub fn execute(&self, request: PutRequest) -> PutResult<PutOutcome> {
        self.execute_event(&mut EntryEvent::new(request))
    }

    /// Creates or updates `key`.
    pub fn put(&self, key: Bytes, value: Bytes) -> PutResult<PutOutcome> {
        self.execute(PutRequest::new(key, value))
    }

    /// Creates `key` only if it has no live entry.
    pub fn create(&self, key: Bytes, value: Bytes) -> PutResult<PutOutcome> {
        self.execute(PutRequest::new(key, value).create_only())
    }

    /// Updates `key` only if it has a live entry.
    pub fn replace(&self, key: Bytes, value: Bytes) -> PutResult<PutOutcome> {
        self.execute(PutRequest::new(key, value).update_only())
    }

    /// Updates `key` only if its current value equals `expected`.
    ///
    /// Returns the replaced value, or `None` if there was no live entry.
    pub fn replace_if_equal(
        &self,
        key: Bytes,
        expected: Bytes,
        value: Bytes,
    ) -> PutResult<Option<Bytes>> {
        let request = PutRequest::new(key, value)
            .update_only()
            .expect_old_value(expected)
            .require_old_value();
        let mut event = EntryEvent::new(request);

        match self.execute_event(&mut event)? {
            PutOutcome::Declined => Ok(None),
            _ => Ok(event.take_old_value()),
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Returns the live value for `key`.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.table.lookup(key).and_then(|slot| slot.value())
    }

    /// Returns the slot mapped to `key`, tombstones included.
    pub fn get_slot(&self, key: &Bytes) -> Option<Arc<EntrySlot>> {
        self.table.lookup(key)
    }

    pub fn contains_key(&self, key: &Bytes) -> bool {
        self.table.lookup(key).is_some_and(|slot| slot.is_live())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.live_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Bytes> {
        self.table.keys()
    }

    pub fn stats(&self) -> PerfStats {
        self.stats.snapshot()
    }

    // ========================================================================
    // DESTROY / CLEAR
    // ========================================================================

    /// Destroys the live entry for `key`, returning its value.
    ///
    /// The slot moves through both tombstone phases and is then unmapped.
    /// Returns `None` if there was no live entry or another destroy got there
    /// first.
    pub fn destroy(&self, key: &Bytes) -> Option<Bytes> {
        let old_value = {
            let _guard = ModificationGuard::acquire(&self.modification_lock);

            let slot = self.table.lookup(key)?;
            let old_value = slot.mark_removed_phase1()?;
            slot.mark_removed_phase2();
            self.table.remove_if_same(key, &slot);
            self.stats.inc_destroys();
            old_value
        };

        for listener in self.listeners.read().iter() {
            listener.after_destroy(key, &old_value);
        }

        Some(old_value)
    }

    /// Removes every entry. Waits for in-flight commit phases to finish.
    ///
    /// Returns the number of mappings removed.
    pub fn clear(&self) -> usize {
        let _exclusive = self.modification_lock.lock_exclusive();
        let removed = self.table.clear();
        self.stats.inc_clears();

        info!(region = %self.config.name, removed, "region cleared");
        removed
    }
}

impl RegionCallback for LocalRegion {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn cache_perf_stats(&self) -> &CachePerfStats {
        &self.stats
    }

    fn basic_put_part2(
        &self,
        event: &dyn EventRecord,
        slot: &Arc<EntrySlot>,
        commit: &PutCommit<'_>,
    ) -> PutResult<u64> {
        slot.set_last_modified(commit.last_modified);

        self.stats.inc_puts();
        match event.operation() {
            Operation::Create => self.stats.inc_creates(),
            Operation::Update => self.stats.inc_updates(),
        }
        if commit.clear_conflict {
            self.stats.inc_clear_conflicts();
        }

        Ok(commit.last_modified)
    }

    fn basic_put_part3(
        &self,
        event: &dyn EventRecord,
        slot: &Arc<EntrySlot>,
        commit: &PutCommit<'_>,
    ) -> PutResult<()> {
        if !commit.invoke_callbacks || !commit.is_initialized {
            return Ok(());
        }

        // A concurrent destroy may already have tombstoned the slot.
        let Some(value) = slot.value() else {
            return Ok(());
        };

        let key = event.key();
        for listener in self.listeners.read().iter() {
            match event.operation() {
                Operation::Create => listener.after_create(key, &value),
                Operation::Update => listener.after_update(key, event.old_value(), &value),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::error::{CodecError, PutError};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl CacheListener for RecordingListener {
        fn after_create(&self, key: &Bytes, value: &Bytes) {
            self.events
                .lock()
                .push(format!("create {:?}={:?}", key, value));
        }

        fn after_update(&self, key: &Bytes, old_value: Option<&Bytes>, new_value: &Bytes) {
            self.events
                .lock()
                .push(format!("update {:?}: {:?} -> {:?}", key, old_value, new_value));
        }

        fn after_destroy(&self, key: &Bytes, old_value: &Bytes) {
            self.events
                .lock()
                .push(format!("destroy {:?}={:?}", key, old_value));
        }
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    fn key(k: &'static str) -> Bytes {
        Bytes::from(k)
    }

    #[test]
    fn test_put_creates_then_updates_in_place() {
        let region = LocalRegion::default();

        let created = region.put(key("k"), key("v1")).unwrap();
        assert!(created.is_created());

        let updated = region.put(key("k"), key("v2")).unwrap();
        assert!(updated.is_updated());
        assert!(Arc::ptr_eq(
            created.slot().unwrap(),
            updated.slot().unwrap()
        ));

        assert_eq!(region.get(&key("k")), Some(key("v2")));
        assert_eq!(updated.slot().unwrap().version(), 1);

        let stats = region.stats();
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.creates, 1);
        assert_eq!(stats.updates, 1);
    }

    #[test]
    fn test_create_only_and_replace() {
        let region = LocalRegion::default();

        assert!(region.replace(key("k"), key("v")).unwrap().is_declined());
        assert!(region.get(&key("k")).is_none());

        assert!(region.create(key("k"), key("v")).unwrap().is_created());
        assert!(region.create(key("k"), key("again")).unwrap().is_declined());
        assert_eq!(region.get(&key("k")), Some(key("v")));

        assert!(region.replace(key("k"), key("v2")).unwrap().is_updated());
        assert_eq!(region.get(&key("k")), Some(key("v2")));

        // Declines are not counted as puts
        assert_eq!(region.stats().puts, 2);
    }

    #[test]
    fn test_replace_if_equal() {
        let region = LocalRegion::default();

        assert_eq!(
            region.replace_if_equal(key("k"), key("a"), key("b")).unwrap(),
            None
        );

        region.put(key("k"), key("a")).unwrap();
        assert_eq!(
            region.replace_if_equal(key("k"), key("a"), key("b")).unwrap(),
            Some(key("a"))
        );
        assert_eq!(region.get(&key("k")), Some(key("b")));

        let mismatch = region.replace_if_equal(key("k"), key("a"), key("c"));
        assert_eq!(
            mismatch,
            Err(PutError::ExpectedValueMismatch { key: key("k") })
        );
        assert_eq!(region.get(&key("k")), Some(key("b")));
    }

    #[test]
    fn test_expected_value_without_update_only_creates_missing_entry() {
        let region = LocalRegion::default();
        let request = PutRequest::new(key("k"), key("v")).expect_old_value(key("anything"));

        assert!(region.execute(request.clone()).unwrap().is_created());
        assert_eq!(region.get(&key("k")), Some(key("v")));

        // Once live, the expectation is enforced
        assert_eq!(
            region.execute(request).unwrap_err(),
            PutError::ExpectedValueMismatch { key: key("k") }
        );
    }

    #[test]
    fn test_destroy_then_create() {
        let region = LocalRegion::default();
        let first = region.put(key("k"), key("v1")).unwrap().into_slot().unwrap();

        assert_eq!(region.destroy(&key("k")), Some(key("v1")));
        assert!(first.is_removed_phase2());
        assert!(region.get_slot(&key("k")).is_none());
        assert_eq!(region.destroy(&key("k")), None);

        let second = region.create(key("k"), key("v2")).unwrap().into_slot().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(region.get(&key("k")), Some(key("v2")));
        assert_eq!(region.stats().destroys, 1);
    }

    #[test]
    fn test_create_supersedes_lingering_cemented_tombstone() {
        let region = LocalRegion::default();
        let old = region.put(key("k"), key("v1")).unwrap().into_slot().unwrap();

        // A destroy that cemented the tombstone but has not unmapped it yet
        old.mark_removed_phase1();
        old.mark_removed_phase2();
        assert!(region.get(&key("k")).is_none());
        assert!(region.replace(key("k"), key("nope")).unwrap().is_declined());

        let fresh = region.create(key("k"), key("v2")).unwrap().into_slot().unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(Arc::ptr_eq(&region.get_slot(&key("k")).unwrap(), &fresh));
        assert_eq!(region.stats().retries, 1);
    }

    #[test]
    fn test_create_blocked_by_transitional_tombstone() {
        let region = LocalRegion::default();
        let old = region.put(key("k"), key("v1")).unwrap().into_slot().unwrap();
        old.mark_removed_phase1();

        assert!(region.create(key("k"), key("v2")).unwrap().is_declined());
        assert!(region
            .execute(PutRequest::new(key("k"), key("v2")).update_only().overwrite_destroyed())
            .unwrap()
            .is_declined());
        assert!(Arc::ptr_eq(&region.get_slot(&key("k")).unwrap(), &old));
    }

    #[test]
    fn test_value_too_large() {
        let region = LocalRegion::new(RegionConfig {
            max_value_size: 4,
            ..Default::default()
        });

        let result = region.put(key("k"), key("12345"));
        assert_eq!(
            result.unwrap_err(),
            PutError::Codec(CodecError::ValueTooLarge { size: 5, max: 4 })
        );
        assert!(region.table().is_empty());
    }

    #[test]
    fn test_clear() {
        let region = LocalRegion::default();
        for i in 0..10 {
            region
                .put(Bytes::from(format!("key-{}", i)), key("value"))
                .unwrap();
        }
        assert_eq!(region.len(), 10);

        assert_eq!(region.clear(), 10);
        assert!(region.is_empty());
        assert_eq!(region.stats().clears, 1);
        assert_eq!(region.stats().clear_conflicts, 0);
    }

    #[test]
    fn test_commit_stamps_last_modified() {
        let region = LocalRegion::with_clock(RegionConfig::default(), Box::new(FixedClock(1234)));
        let slot = region.put(key("k"), key("v")).unwrap().into_slot().unwrap();
        assert_eq!(slot.last_modified(), 1234);
    }

    #[test]
    fn test_listeners() {
        let region = LocalRegion::default();
        let listener = Arc::new(RecordingListener::default());
        region.add_listener(listener.clone());

        region.create(key("k"), key("a")).unwrap();
        region.create(key("k"), key("ignored")).unwrap();
        region
            .execute(PutRequest::new(key("k"), key("b")).require_old_value())
            .unwrap();
        region.destroy(&key("k"));

        let events = listener.events.lock().clone();
        assert_eq!(
            events,
            vec![
                r#"create b"k"=b"a""#.to_string(),
                r#"update b"k": Some(b"a") -> b"b""#.to_string(),
                r#"destroy b"k"=b"b""#.to_string(),
            ]
        );
    }

    #[test]
    fn test_uninitialized_region_skips_listeners() {
        let region = LocalRegion::default();
        let listener = Arc::new(RecordingListener::default());
        region.add_listener(listener.clone());
        region.set_initialized(false);

        assert!(region.put(key("k"), key("v")).unwrap().is_created());
        assert!(listener.events.lock().is_empty());
        assert_eq!(region.stats().creates, 1);
    }
}
