//! Region statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the put path and the region.
///
/// All counters use relaxed ordering; values are approximate under load.
#[derive(Debug, Default)]
pub struct CachePerfStats {
    puts: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
    retries: AtomicU64,
    clear_conflicts: AtomicU64,
    destroys: AtomicU64,
    clears: AtomicU64,
}

impl CachePerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_creates(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// A create ran into a cemented tombstone and had to retry.
    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A put committed after the table was cleared underneath it.
    pub fn inc_clear_conflicts(&self) {
        self.clear_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_destroys(&self) {
        self.destroys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_clears(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> PerfStats {
        PerfStats {
            puts: self.puts.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            clear_conflicts: self.clear_conflicts.load(Ordering::Relaxed),
            destroys: self.destroys.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
        }
    }
}

/// Region statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfStats {
    /// Committed puts (creates + updates)
    pub puts: u64,
    /// Puts that installed a new entry
    pub creates: u64,
    /// Puts that updated an entry in place
    pub updates: u64,
    /// Create retries caused by cemented tombstones
    pub retries: u64,
    /// Puts that observed a concurrent clear
    pub clear_conflicts: u64,
    /// Completed destroys
    pub destroys: u64,
    /// Region clears
    pub clears: u64,
}
