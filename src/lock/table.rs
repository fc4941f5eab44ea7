//! Lock table implementation

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::page::Value;

/// Identifies the operation holding a lock
pub type OwnerId = u64;

/// Registry of held primary-key locks
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<Value, OwnerId>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` as the holder of `key` iff nobody holds it
    pub fn acquire(&self, key: Value, owner: OwnerId) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            trace!(key, owner, "lock contention");
            return false;
        }
        entries.insert(key, owner);
        true
    }

    /// Drop the entry for `key`, whoever holds it
    pub fn release(&self, key: Value) {
        self.entries.lock().remove(&key);
    }

    pub fn is_locked(&self, key: Value) -> bool {
        self.entries.lock().contains_key(&key)
    }

    pub fn owner_of(&self, key: Value) -> Option<OwnerId> {
        self.entries.lock().get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Acquire `key` and return a guard that releases it when dropped
    pub fn try_lock(&self, key: Value, owner: OwnerId) -> Option<KeyLockGuard<'_>> {
        if self.acquire(key, owner) {
            Some(KeyLockGuard { table: self, key })
        } else {
            None
        }
    }
}

/// Holds one key of a `LockTable` until dropped
#[derive(Debug)]
pub struct KeyLockGuard<'a> {
    table: &'a LockTable,
    key: Value,
}

impl KeyLockGuard<'_> {
    pub fn key(&self) -> Value {
        self.key
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(self.key);
    }
}
