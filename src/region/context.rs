//! Region Context
//!
//! Everything the put path needs from the surrounding region is passed in
//! explicitly through a [`RegionContext`]: the commit hooks, whether the
//! region has finished initializing, and a clock.

use crate::entry::EntrySlot;
use crate::region::error::PutResult;
use crate::region::event::EventRecord;
use crate::region::stats::CachePerfStats;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond wall clock.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Arguments shared by both commit hooks.
#[derive(Debug, Clone, Copy)]
pub struct PutCommit<'a> {
    pub is_initialized: bool,
    /// For part 2 the time the commit started; for part 3 the timestamp
    /// part 2 returned.
    pub last_modified: u64,
    /// The table was cleared while this put was in flight
    pub clear_conflict: bool,
    pub invoke_callbacks: bool,
    pub create_only: bool,
    pub update_only: bool,
    pub require_old_value: bool,
    pub expected_old_value: Option<&'a Bytes>,
}

/// Post-commit hooks of a region.
///
/// Only invoked after a put has been admitted and its slot is resident (or
/// updated). Failures propagate to the caller without rolling the slot back.
pub trait RegionCallback: Send + Sync {
    fn name(&self) -> &str;

    fn is_initialized(&self) -> bool;

    fn cache_perf_stats(&self) -> &CachePerfStats;

    /// Records the mutation. Returns the last-modified timestamp it applied.
    fn basic_put_part2(
        &self,
        event: &dyn EventRecord,
        slot: &Arc<EntrySlot>,
        commit: &PutCommit<'_>,
    ) -> PutResult<u64>;

    /// Delivers the mutation to listeners and anything downstream.
    fn basic_put_part3(
        &self,
        event: &dyn EventRecord,
        slot: &Arc<EntrySlot>,
        commit: &PutCommit<'_>,
    ) -> PutResult<()>;
}

/// Explicit handle on the region a put runs against.
#[derive(Clone, Copy)]
pub struct RegionContext<'a> {
    callback: &'a dyn RegionCallback,
    clock: &'a dyn Clock,
}

impl<'a> RegionContext<'a> {
    pub fn new(callback: &'a dyn RegionCallback, clock: &'a dyn Clock) -> Self {
        Self { callback, clock }
    }

    pub fn callback(&self) -> &'a dyn RegionCallback {
        self.callback
    }

    pub fn name(&self) -> &'a str {
        self.callback.name()
    }

    pub fn is_initialized(&self) -> bool {
        self.callback.is_initialized()
    }

    pub fn stats(&self) -> &'a CachePerfStats {
        self.callback.cache_perf_stats()
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }
}

impl std::fmt::Debug for RegionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionContext")
            .field("region", &self.name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
