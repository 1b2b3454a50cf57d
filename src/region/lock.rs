//! Cache Modification Lock
//!
//! Puts hold this lock in shared mode around their commit phase so that a
//! region-wide operation such as `clear` (which takes it exclusively) never
//! interleaves with commit-phase bookkeeping. It does not serialize puts
//! against each other; per-key atomicity comes from the entry table.
//!
//! ```text
//!   put commit ──┐
//!   put commit ──┼──> shared ──┐
//!   destroy    ──┘             ├── RegionModificationLock
//!   clear      ──> exclusive ──┘
//! ```

use parking_lot::{Condvar, Mutex};

/// A lock the commit phase acquires and releases.
pub trait CacheModificationLock: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

/// Holds a [`CacheModificationLock`] for the lifetime of the guard.
///
/// The lock is released in `Drop`, so every exit path releases it, including
/// early returns through `?` and unwinding.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ModificationGuard<'a> {
    lock: &'a dyn CacheModificationLock,
}

impl<'a> ModificationGuard<'a> {
    pub fn acquire(lock: &'a dyn CacheModificationLock) -> Self {
        lock.lock();
        Self { lock }
    }
}

impl Drop for ModificationGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[derive(Debug, Default)]
struct LockState {
    shared: usize,
    exclusive: bool,
    /// Exclusive acquirers waiting for shared holders to drain
    exclusive_waiting: usize,
}

/// Shared/exclusive modification lock for a region.
///
/// Exclusive acquirers take priority: once one is waiting, new shared
/// acquirers wait behind it, so a steady stream of puts cannot starve a
/// clear. Shared acquisition is therefore not reentrant while an exclusive
/// acquirer is pending.
#[derive(Debug, Default)]
pub struct RegionModificationLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl RegionModificationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for all shared holders to leave, then holds the lock exclusively.
    pub fn lock_exclusive(&self) -> ExclusiveGuard<'_> {
        let mut state = self.state.lock();
        state.exclusive_waiting += 1;
        while state.exclusive || state.shared > 0 {
            self.changed.wait(&mut state);
        }
        state.exclusive_waiting -= 1;
        state.exclusive = true;
        ExclusiveGuard { lock: self }
    }

    /// Number of exclusive acquirers currently waiting.
    pub fn exclusive_waiters(&self) -> usize {
        self.state.lock().exclusive_waiting
    }

    /// Number of current shared holders.
    pub fn shared_holders(&self) -> usize {
        self.state.lock().shared
    }

    pub fn is_exclusively_held(&self) -> bool {
        self.state.lock().exclusive
    }
}

impl CacheModificationLock for RegionModificationLock {
    fn lock(&self) {
        let mut state = self.state.lock();
        while state.exclusive || state.exclusive_waiting > 0 {
            self.changed.wait(&mut state);
        }
        state.shared += 1;
    }

    fn unlock(&self) {
        let mut state = self.state.lock();
        state.shared = state.shared.saturating_sub(1);
        if state.shared == 0 {
            self.changed.notify_all();
        }
    }
}

/// Exclusive hold on a [`RegionModificationLock`].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ExclusiveGuard<'a> {
    lock: &'a RegionModificationLock,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        state.exclusive = false;
        self.lock.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = RegionModificationLock::new();
        {
            let _first = ModificationGuard::acquire(&lock);
            let _second = ModificationGuard::acquire(&lock);
            assert_eq!(lock.shared_holders(), 2);
        }
        assert_eq!(lock.shared_holders(), 0);
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn hook() -> Result<(), &'static str> {
            Err("hook failed")
        }

        fn fails(lock: &RegionModificationLock) -> Result<(), &'static str> {
            let _guard = ModificationGuard::acquire(lock);
            hook()?;
            Ok(())
        }

        let lock = RegionModificationLock::new();
        assert!(fails(&lock).is_err());
        assert_eq!(lock.shared_holders(), 0);
    }

    #[test]
    fn test_exclusive_waits_for_shared() {
        let lock = Arc::new(RegionModificationLock::new());
        let acquired = Arc::new(AtomicBool::new(false));

        let guard = ModificationGuard::acquire(lock.as_ref());

        let handle = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _exclusive = lock.lock_exclusive();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(guard);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(!lock.is_exclusively_held());
    }

    #[test]
    fn test_shared_waits_for_exclusive() {
        let lock = Arc::new(RegionModificationLock::new());
        let exclusive = lock.lock_exclusive();
        let acquired = Arc::new(AtomicBool::new(false));

        let handle = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _guard = ModificationGuard::acquire(lock.as_ref());
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(exclusive);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pending_exclusive_blocks_new_shared() {
        let lock = Arc::new(RegionModificationLock::new());
        let cleared = Arc::new(AtomicBool::new(false));
        let late_acquired = Arc::new(AtomicBool::new(false));

        let first = ModificationGuard::acquire(lock.as_ref());

        let clearer = {
            let lock = Arc::clone(&lock);
            let cleared = Arc::clone(&cleared);
            thread::spawn(move || {
                let _exclusive = lock.lock_exclusive();
                cleared.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
            })
        };
        while lock.exclusive_waiters() == 0 {
            thread::yield_now();
        }

        let late = {
            let lock = Arc::clone(&lock);
            let cleared = Arc::clone(&cleared);
            let late_acquired = Arc::clone(&late_acquired);
            thread::spawn(move || {
                let _guard = ModificationGuard::acquire(lock.as_ref());
                // Admitted only after the exclusive holder ran
                assert!(cleared.load(Ordering::SeqCst));
                late_acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(lock.shared_holders(), 1);
        assert!(!late_acquired.load(Ordering::SeqCst));
        assert!(!cleared.load(Ordering::SeqCst));

        drop(first);
        clearer.join().unwrap();
        late.join().unwrap();
        assert!(cleared.load(Ordering::SeqCst));
        assert!(late_acquired.load(Ordering::SeqCst));
        assert_eq!(lock.shared_holders(), 0);
    }
}
