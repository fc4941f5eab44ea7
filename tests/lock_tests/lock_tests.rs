//! Tests for LockTable
//!
//! These tests verify:
//! - Single-owner, non-blocking acquisition
//! - Release and guard cleanup on every exit path
//! - Contention across threads

use std::sync::Arc;
use std::thread;

use lstore::lock::LockTable;

#[test]
fn test_acquire_and_release() {
    let locks = LockTable::new();

    assert!(locks.acquire(1, 100));
    assert!(locks.is_locked(1));
    assert_eq!(locks.owner_of(1), Some(100));

    locks.release(1);
    assert!(!locks.is_locked(1));
    assert!(locks.is_empty());
}

#[test]
fn test_second_acquire_fails_without_blocking() {
    let locks = LockTable::new();

    assert!(locks.acquire(1, 100));
    assert!(!locks.acquire(1, 200));
    // Not reentrant either
    assert!(!locks.acquire(1, 100));
    assert_eq!(locks.owner_of(1), Some(100));
}

#[test]
fn test_independent_keys() {
    let locks = LockTable::new();

    assert!(locks.acquire(1, 100));
    assert!(locks.acquire(2, 200));
    assert_eq!(locks.len(), 2);
}

#[test]
fn test_guard_releases_on_drop() {
    let locks = LockTable::new();
    {
        let guard = locks.try_lock(9, 1).unwrap();
        assert_eq!(guard.key(), 9);
        assert!(locks.try_lock(9, 2).is_none());
    }
    assert!(!locks.is_locked(9));
    assert!(locks.try_lock(9, 2).is_some());
}

#[test]
fn test_guard_releases_on_early_return() {
    fn fails(locks: &LockTable) -> Result<(), &'static str> {
        let _guard = locks.try_lock(3, 1).ok_or("locked")?;
        Err("operation failed")
    }

    let locks = LockTable::new();
    assert!(fails(&locks).is_err());
    assert!(!locks.is_locked(3));
}

#[test]
fn test_concurrent_acquire_single_winner() {
    let locks = Arc::new(LockTable::new());
    let handles: Vec<_> = (0..8)
        .map(|owner| {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire(42, owner))
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
