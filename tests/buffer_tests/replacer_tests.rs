//! Tests for page replacement policies

use std::collections::HashSet;

use lstore::buffer::{LruReplacer, PageId, RandomReplacer, Replacer};

fn page(n: usize) -> PageId {
    PageId::tail(1, 0, n)
}

// =============================================================================
// Random
// =============================================================================

#[test]
fn test_random_evicts_only_candidates() {
    let mut replacer = RandomReplacer::with_seed(42);
    for n in 0..5 {
        replacer.insert(page(n));
    }
    replacer.pin(page(2));

    let mut victims = HashSet::new();
    while let Some(victim) = replacer.evict() {
        victims.insert(victim);
    }

    assert_eq!(victims.len(), 4);
    assert!(!victims.contains(&page(2)));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_random_same_seed_same_sequence() {
    let sequence = |seed| {
        let mut replacer = RandomReplacer::with_seed(seed);
        for n in 0..8 {
            replacer.insert(page(n));
        }
        (0..8).filter_map(|_| replacer.evict()).collect::<Vec<_>>()
    };

    assert_eq!(sequence(11), sequence(11));
}

#[test]
fn test_random_unpin_restores_candidate() {
    let mut replacer = RandomReplacer::with_seed(1);
    replacer.insert(page(0));
    replacer.pin(page(0));
    assert_eq!(replacer.evict(), None);

    replacer.unpin(page(0));
    assert_eq!(replacer.evict(), Some(page(0)));
}

#[test]
fn test_random_duplicate_insert_ignored() {
    let mut replacer = RandomReplacer::with_seed(1);
    replacer.insert(page(0));
    replacer.insert(page(0));

    assert_eq!(replacer.size(), 1);
}

// =============================================================================
// LRU
// =============================================================================

#[test]
fn test_lru_order() {
    let mut replacer = LruReplacer::new(4);
    replacer.insert(page(0));
    replacer.insert(page(1));
    replacer.insert(page(2));
    replacer.record_access(page(0));

    assert_eq!(replacer.evict(), Some(page(1)));
    assert_eq!(replacer.evict(), Some(page(2)));
    assert_eq!(replacer.evict(), Some(page(0)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_pin_and_remove() {
    let mut replacer = LruReplacer::new(4);
    replacer.insert(page(0));
    replacer.insert(page(1));
    replacer.pin(page(0));
    replacer.remove(page(1));

    assert_eq!(replacer.size(), 0);
    replacer.unpin(page(0));
    assert_eq!(replacer.evict(), Some(page(0)));
}
