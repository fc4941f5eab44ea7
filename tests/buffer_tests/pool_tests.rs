//! Tests for BufferPool
//!
//! These tests verify:
//! - Residency and capacity
//! - Pinned pages are never evicted
//! - Dirty victims are written back before leaving
//! - Failed write-back keeps the victim resident and dirty
//! - flush_all clears the dirty set
//! - touch and access_pinned are atomic against concurrent eviction

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use lstore::buffer::{BufferPool, LruReplacer, PageId, RandomReplacer, WriteBack};
use lstore::config::EvictionPolicy;
use lstore::error::Result;
use lstore::LStoreError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Records every page written back; can be told to fail
#[derive(Default)]
struct RecordingWriter {
    written: Mutex<Vec<PageId>>,
    fail: AtomicBool,
}

impl RecordingWriter {
    fn written(&self) -> Vec<PageId> {
        self.written.lock().clone()
    }
}

impl WriteBack for RecordingWriter {
    fn write_back(&self, pages: &[PageId]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.written.lock().extend_from_slice(pages);
        Ok(())
    }
}

/// Counts write-backs per page
#[derive(Default)]
struct CountingWriter {
    writes: Mutex<HashMap<PageId, usize>>,
}

impl CountingWriter {
    fn writes_of(&self, page: PageId) -> usize {
        self.writes.lock().get(&page).copied().unwrap_or(0)
    }
}

impl WriteBack for CountingWriter {
    fn write_back(&self, pages: &[PageId]) -> Result<()> {
        let mut writes = self.writes.lock();
        for page in pages {
            *writes.entry(*page).or_insert(0) += 1;
        }
        Ok(())
    }
}

fn page(n: usize) -> PageId {
    PageId::base(1, 0, n)
}

fn lru_pool(capacity: usize) -> (Arc<RecordingWriter>, BufferPool) {
    let writer = Arc::new(RecordingWriter::default());
    let pool = BufferPool::new(capacity, Box::new(LruReplacer::new(capacity)), writer.clone());
    (writer, pool)
}

// =============================================================================
// Residency Tests
// =============================================================================

#[test]
fn test_access_makes_resident() {
    let (_writer, pool) = lru_pool(2);

    pool.access(page(0)).unwrap();
    assert!(pool.is_resident(page(0)));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_capacity_is_respected() {
    let (_writer, pool) = lru_pool(3);
    for n in 0..10 {
        pool.access(page(n)).unwrap();
    }

    assert_eq!(pool.len(), 3);
    assert_eq!(pool.capacity(), 3);
}

#[test]
fn test_lru_evicts_least_recent() {
    let (_writer, pool) = lru_pool(2);
    pool.access(page(0)).unwrap();
    pool.access(page(1)).unwrap();
    pool.access(page(0)).unwrap();
    pool.access(page(2)).unwrap();

    assert!(pool.is_resident(page(0)));
    assert!(!pool.is_resident(page(1)));
    assert!(pool.is_resident(page(2)));
}

#[test]
fn test_pin_only_applies_to_resident() {
    let (_writer, pool) = lru_pool(2);

    assert!(!pool.pin(page(0)));
    pool.access(page(0)).unwrap();
    assert!(pool.pin(page(0)));
    assert!(pool.is_pinned(page(0)));
}

#[test]
fn test_pinned_page_survives_eviction() {
    let writer = Arc::new(RecordingWriter::default());
    let pool = BufferPool::new(2, Box::new(RandomReplacer::with_seed(7)), writer);
    pool.access(page(0)).unwrap();
    pool.pin(page(0));

    for n in 1..50 {
        pool.access(page(n)).unwrap();
        assert!(pool.is_resident(page(0)));
    }
}

#[test]
fn test_pins_are_counted() {
    let (_writer, pool) = lru_pool(1);
    pool.access(page(0)).unwrap();
    pool.pin(page(0));
    pool.pin(page(0));

    pool.unpin(page(0));
    assert!(pool.is_pinned(page(0)));
    pool.unpin(page(0));
    assert!(!pool.is_pinned(page(0)));

    pool.access(page(1)).unwrap();
    assert!(!pool.is_resident(page(0)));
}

#[test]
fn test_all_pinned_admits_over_capacity() {
    let (_writer, pool) = lru_pool(1);
    pool.access(page(0)).unwrap();
    pool.pin(page(0));

    pool.access(page(1)).unwrap();
    assert_eq!(pool.len(), 2);
    assert!(pool.is_resident(page(0)));
    assert!(pool.is_resident(page(1)));
}

#[test]
fn test_access_pinned_admits_and_pins() {
    let (_writer, pool) = lru_pool(1);
    pool.access_pinned(page(0)).unwrap();
    assert!(pool.is_pinned(page(0)));

    pool.access(page(1)).unwrap();
    assert!(pool.is_resident(page(0)));

    pool.unpin(page(0));
    assert!(!pool.is_pinned(page(0)));
}

#[test]
fn test_concurrent_access_pinned_never_loses_pin() {
    let pool = Arc::new(BufferPool::new(
        1,
        Box::new(RandomReplacer::with_seed(11)),
        Arc::new(RecordingWriter::default()),
    ));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..5_000 {
                    pool.access_pinned(page(n)).unwrap();
                    assert!(pool.is_resident(page(n)));
                    assert!(pool.is_pinned(page(n)));
                    pool.unpin(page(n));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// =============================================================================
// Dirty Tracking Tests
// =============================================================================

#[test]
fn test_mark_dirty_requires_residency() {
    let (_writer, pool) = lru_pool(2);

    assert!(!pool.mark_dirty(page(0)));
    pool.access(page(0)).unwrap();
    assert!(pool.mark_dirty(page(0)));
    assert!(pool.is_dirty(page(0)));
}

#[test]
fn test_dirty_victim_written_back() {
    let (writer, pool) = lru_pool(1);
    pool.touch(page(0)).unwrap();
    pool.access(page(1)).unwrap();

    assert_eq!(writer.written(), vec![page(0)]);
    assert!(!pool.is_dirty(page(0)));
}

#[test]
fn test_touch_marks_dirty() {
    let (_writer, pool) = lru_pool(1);
    pool.touch(page(0)).unwrap();
    assert!(pool.is_resident(page(0)));
    assert!(pool.is_dirty(page(0)));
}

#[test]
fn test_concurrent_touch_keeps_every_modification() {
    let writer = Arc::new(CountingWriter::default());
    let pool = Arc::new(BufferPool::new(
        1,
        Box::new(LruReplacer::new(1)),
        writer.clone(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let pool = Arc::clone(&pool);
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                let mut lost = 0;
                for _ in 0..20_000 {
                    let before = writer.writes_of(page(n));
                    pool.touch(page(n)).unwrap();
                    // Either still dirty or written back since the touch began
                    if !pool.is_dirty(page(n)) && writer.writes_of(page(n)) == before {
                        lost += 1;
                    }
                }
                lost
            })
        })
        .collect();

    let lost: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(lost, 0);
}

#[test]
fn test_clean_victim_not_written() {
    let (writer, pool) = lru_pool(1);
    pool.access(page(0)).unwrap();
    pool.access(page(1)).unwrap();

    assert!(writer.written().is_empty());
}

#[test]
fn test_failed_write_back_keeps_victim() {
    let (writer, pool) = lru_pool(1);
    pool.touch(page(0)).unwrap();
    writer.fail.store(true, Ordering::SeqCst);

    assert!(pool.access(page(1)).is_err());
    assert!(pool.is_resident(page(0)));
    assert!(pool.is_dirty(page(0)));
    // The requested page is still admitted
    assert!(pool.is_resident(page(1)));
}

#[test]
fn test_flush_all() {
    let (writer, pool) = lru_pool(4);
    pool.touch(page(2)).unwrap();
    pool.touch(page(0)).unwrap();
    pool.access(page(1)).unwrap();

    assert_eq!(pool.flush_all().unwrap(), 2);
    assert_eq!(writer.written(), vec![page(0), page(2)]);
    assert_eq!(pool.dirty_count(), 0);
    assert_eq!(pool.flush_all().unwrap(), 0);
}

#[test]
fn test_failed_flush_keeps_dirty_set() {
    let (writer, pool) = lru_pool(4);
    pool.touch(page(0)).unwrap();
    writer.fail.store(true, Ordering::SeqCst);

    assert!(pool.flush_all().is_err());
    assert!(pool.is_dirty(page(0)));
}

#[test]
fn test_with_policy_random_seeded() {
    let writer = Arc::new(RecordingWriter::default());
    let pool = BufferPool::with_policy(2, EvictionPolicy::Random, Some(3), writer);
    for n in 0..5 {
        pool.access(page(n)).unwrap();
    }

    assert_eq!(pool.len(), 2);
    assert!(pool.is_resident(page(4)));
}
