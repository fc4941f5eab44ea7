//! Buffer pool manager.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::EvictionPolicy;
use crate::error::Result;

use super::replacer::{LruReplacer, RandomReplacer, Replacer};
use super::{PageId, WriteBack};

/// Buffer pool manager.
///
/// Holds up to `capacity` resident page entries. Residency, pin counts, the
/// dirty set and the replacer live behind one mutex, and write-back of an
/// evicted page happens while it is held, so an eviction is atomic with
/// respect to a concurrent `access` of the same page.
///
/// When every resident entry is pinned the pool admits new entries over
/// capacity rather than failing; it shrinks back as pinned entries are
/// evicted later.
pub struct BufferPool {
    capacity: usize,
    writer: Arc<dyn WriteBack>,
    state: Mutex<PoolState>,
}

struct PoolState {
    resident: HashSet<PageId>,
    dirty: HashSet<PageId>,
    pins: HashMap<PageId, usize>,
    replacer: Box<dyn Replacer>,
}

impl BufferPool {
    /// Creates a buffer pool with an explicit replacement policy.
    pub fn new(capacity: usize, replacer: Box<dyn Replacer>, writer: Arc<dyn WriteBack>) -> Self {
        Self {
            capacity,
            writer,
            state: Mutex::new(PoolState {
                resident: HashSet::with_capacity(capacity),
                dirty: HashSet::new(),
                pins: HashMap::new(),
                replacer,
            }),
        }
    }

    /// Creates a buffer pool for a configured policy.
    pub fn with_policy(
        capacity: usize,
        policy: EvictionPolicy,
        seed: Option<u64>,
        writer: Arc<dyn WriteBack>,
    ) -> Self {
        let replacer: Box<dyn Replacer> = match (policy, seed) {
            (EvictionPolicy::Random, Some(seed)) => Box::new(RandomReplacer::with_seed(seed)),
            (EvictionPolicy::Random, None) => Box::new(RandomReplacer::new()),
            (EvictionPolicy::Lru, _) => Box::new(LruReplacer::new(capacity)),
        };
        Self::new(capacity, replacer, writer)
    }

    /// Ensures `page` is resident, evicting a victim when the pool is full.
    ///
    /// On a failed write-back the victim stays resident and dirty, `page` is
    /// admitted anyway and the error is returned.
    pub fn access(&self, page: PageId) -> Result<()> {
        let mut state = self.state.lock();
        self.admit_locked(&mut state, page)
    }

    /// `access` and `pin` under one critical section, so the page cannot be
    /// evicted between admission and pinning.
    pub fn access_pinned(&self, page: PageId) -> Result<()> {
        let mut state = self.state.lock();
        let result = self.admit_locked(&mut state, page);
        Self::pin_locked(&mut state, page);
        result
    }

    fn admit_locked(&self, state: &mut PoolState, page: PageId) -> Result<()> {
        if state.resident.contains(&page) {
            state.replacer.record_access(page);
            return Ok(());
        }

        let mut result = Ok(());
        if state.resident.len() >= self.capacity {
            let victim = state.replacer.evict();
            match victim {
                Some(victim) => result = self.evict_locked(state, victim),
                None => warn!(
                    %page,
                    resident = state.resident.len(),
                    "all pages pinned, admitting over capacity"
                ),
            }
        }

        state.resident.insert(page);
        if !state.pins.contains_key(&page) {
            state.replacer.insert(page);
        }
        result
    }

    fn evict_locked(&self, state: &mut PoolState, victim: PageId) -> Result<()> {
        if state.dirty.contains(&victim) {
            if let Err(e) = self.writer.write_back(&[victim]) {
                error!(page = %victim, error = %e, "write-back of evicted page failed");
                state.replacer.insert(victim);
                return Err(e);
            }
            state.dirty.remove(&victim);
        }
        state.resident.remove(&victim);
        debug!(page = %victim, "evicted page");
        Ok(())
    }

    /// Marks a resident page as ineligible for eviction. Returns false if it
    /// is not resident.
    pub fn pin(&self, page: PageId) -> bool {
        let mut state = self.state.lock();
        if !state.resident.contains(&page) {
            return false;
        }
        Self::pin_locked(&mut state, page);
        true
    }

    fn pin_locked(state: &mut PoolState, page: PageId) {
        *state.pins.entry(page).or_insert(0) += 1;
        state.replacer.pin(page);
    }

    /// Drops one pin; the page becomes evictable when none remain.
    pub fn unpin(&self, page: PageId) {
        let mut state = self.state.lock();
        let Some(count) = state.pins.get_mut(&page) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            state.pins.remove(&page);
            if state.resident.contains(&page) {
                state.replacer.unpin(page);
            }
        }
    }

    /// Records unflushed changes on a resident page. Returns false if it is
    /// not resident.
    pub fn mark_dirty(&self, page: PageId) -> bool {
        let mut state = self.state.lock();
        if !state.resident.contains(&page) {
            return false;
        }
        state.dirty.insert(page);
        true
    }

    /// `access` followed by `mark_dirty`, under one critical section so the
    /// page cannot be evicted clean in between.
    pub fn touch(&self, page: PageId) -> Result<()> {
        let mut state = self.state.lock();
        let result = self.admit_locked(&mut state, page);
        state.dirty.insert(page);
        result
    }

    /// Writes every dirty page back and clears the dirty set.
    ///
    /// On failure the dirty set is left as it was.
    pub fn flush_all(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if state.dirty.is_empty() {
            return Ok(0);
        }
        let mut pages: Vec<PageId> = state.dirty.iter().copied().collect();
        pages.sort_unstable();
        self.writer.write_back(&pages)?;
        state.dirty.clear();
        debug!(pages = pages.len(), "flushed dirty pages");
        Ok(pages.len())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().resident.is_empty()
    }

    pub fn is_resident(&self, page: PageId) -> bool {
        self.state.lock().resident.contains(&page)
    }

    pub fn is_dirty(&self, page: PageId) -> bool {
        self.state.lock().dirty.contains(&page)
    }

    pub fn is_pinned(&self, page: PageId) -> bool {
        self.state.lock().pins.contains_key(&page)
    }

    pub fn dirty_count(&self) -> usize {
        self.state.lock().dirty.len()
    }
}
