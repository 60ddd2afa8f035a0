//! Per-device processing locks
//!
//! A re-entrancy guard against overlapping synchronization passes over the
//! same device, not a multi-core mutex: a tick that finds a device locked
//! skips it and lets the in-flight pass finish.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Set of device ids currently undergoing a synchronization pass
#[derive(Debug, Default)]
pub struct ProcessingLocks {
    locked: Mutex<HashSet<String>>,
}

impl ProcessingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `id` as locked iff not already locked.
    /// Returns whether the lock was acquired.
    pub fn try_lock(&self, id: &str) -> bool {
        self.locked.lock().insert(id.to_string())
    }

    /// Release the lock. Idempotent; safe to call for ids never locked.
    pub fn unlock(&self, id: &str) {
        self.locked.lock().remove(id);
    }

    /// Whether a pass currently holds the lock for `id`
    pub fn is_locked(&self, id: &str) -> bool {
        self.locked.lock().contains(id)
    }
}
