//! Page replacement policies for the buffer pool.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::PageId;

/// Page replacement policy trait.
///
/// Tracks the resident pages that may be evicted. Pinned pages are taken out
/// of the candidate set and put back when unpinned. Calls for pages the
/// replacer does not hold, or already holds, are no-ops.
pub trait Replacer: Send {
    /// A page became resident (and evictable).
    fn insert(&mut self, page: PageId);

    /// A resident page was accessed again.
    fn record_access(&mut self, page: PageId);

    /// Removes a page from eviction candidates.
    fn pin(&mut self, page: PageId);

    /// Makes a resident page evictable again.
    fn unpin(&mut self, page: PageId);

    /// Selects and removes a victim, or `None` if nothing is evictable.
    fn evict(&mut self) -> Option<PageId>;

    /// Forgets a page entirely.
    fn remove(&mut self, page: PageId);

    /// Returns the number of evictable pages.
    fn size(&self) -> usize;
}

// =============================================================================
// Random
// =============================================================================

/// Evicts a page chosen uniformly at random among the evictable ones.
pub struct RandomReplacer {
    candidates: Vec<PageId>,
    positions: HashMap<PageId, usize>,
    rng: StdRng,
}

impl RandomReplacer {
    /// Seeded from the OS
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible victim sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            candidates: Vec::new(),
            positions: HashMap::new(),
            rng,
        }
    }

    fn add(&mut self, page: PageId) {
        if self.positions.contains_key(&page) {
            return;
        }
        self.positions.insert(page, self.candidates.len());
        self.candidates.push(page);
    }

    fn take(&mut self, page: PageId) -> bool {
        let Some(pos) = self.positions.remove(&page) else {
            return false;
        };
        self.candidates.swap_remove(pos);
        if let Some(moved) = self.candidates.get(pos) {
            self.positions.insert(*moved, pos);
        }
        true
    }
}

impl Default for RandomReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for RandomReplacer {
    fn insert(&mut self, page: PageId) {
        self.add(page);
    }

    fn record_access(&mut self, _page: PageId) {}

    fn pin(&mut self, page: PageId) {
        self.take(page);
    }

    fn unpin(&mut self, page: PageId) {
        self.add(page);
    }

    fn evict(&mut self) -> Option<PageId> {
        if self.candidates.is_empty() {
            return None;
        }
        let victim = self.candidates[self.rng.gen_range(0..self.candidates.len())];
        self.take(victim);
        Some(victim)
    }

    fn remove(&mut self, page: PageId) {
        self.take(page);
    }

    fn size(&self) -> usize {
        self.candidates.len()
    }
}

// =============================================================================
// LRU
// =============================================================================

/// Evicts the least recently accessed evictable page.
///
/// Uses `VecDeque` (front = LRU); reordering is linear in pool size, which
/// stays small.
pub struct LruReplacer {
    lru_list: VecDeque<PageId>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lru_list: VecDeque::with_capacity(capacity),
        }
    }

    fn take(&mut self, page: PageId) -> bool {
        match self.lru_list.iter().position(|&p| p == page) {
            Some(pos) => {
                self.lru_list.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl Replacer for LruReplacer {
    fn insert(&mut self, page: PageId) {
        if !self.lru_list.contains(&page) {
            self.lru_list.push_back(page);
        }
    }

    fn record_access(&mut self, page: PageId) {
        if self.take(page) {
            self.lru_list.push_back(page);
        }
    }

    fn pin(&mut self, page: PageId) {
        self.take(page);
    }

    fn unpin(&mut self, page: PageId) {
        self.insert(page);
    }

    fn evict(&mut self) -> Option<PageId> {
        self.lru_list.pop_front()
    }

    fn remove(&mut self, page: PageId) {
        self.take(page);
    }

    fn size(&self) -> usize {
        self.lru_list.len()
    }
}
