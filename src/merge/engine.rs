//! Merge engine

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::buffer::{BufferPool, PageId};
use crate::error::{LStoreError, Result};
use crate::page::{BasePage, PageStore, TailRow, Value};

use super::MergeCheckpoint;

/// Outcome of one merge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Tail records consumed by this pass (including failed steps)
    pub processed: u64,

    /// Steps that were logged and skipped
    pub failed: u64,

    /// Cursor after the pass
    pub tps: u64,
}

/// Cloned base page plus the cells a pass has written into it
///
/// The live page may grow while a pass runs. When a tail record targets a
/// slot past the end of the clone, the clone is taken again from the live
/// page and the recorded cells are replayed onto it.
struct WorkingPage {
    copy: BasePage,
    cells: BTreeMap<(usize, usize), Value>,
}

impl WorkingPage {
    fn new(copy: BasePage) -> Self {
        Self {
            copy,
            cells: BTreeMap::new(),
        }
    }

    fn refresh(&mut self, live: &BasePage) -> Result<()> {
        let mut copy = live.clone();
        for (&(column, slot), &value) in &self.cells {
            copy.set_value(column, slot, value)?;
        }
        self.copy = copy;
        Ok(())
    }

    fn set(&mut self, column: usize, slot: usize, value: Value) -> Result<()> {
        self.copy.set_value(column, slot, value)?;
        self.cells.insert((column, slot), value);
        Ok(())
    }
}

/// Compaction of one table's tail records into its base pages
///
/// ## Concurrency
/// - Passes are serialized by `run_lock`; a pass never overlaps another
/// - The pass reads the store under short read locks and builds its changes
///   on cloned base pages, so readers never see a half-merged page
/// - Installation takes the store write lock once and copies only the merged
///   user-column prefix of each touched page
pub struct MergeEngine {
    table: u32,
    store: Arc<RwLock<PageStore>>,
    pool: Arc<BufferPool>,
    batch_size: u64,
    threshold: u64,
    tps: AtomicU64,
    pending: AtomicU64,
    run_lock: Mutex<()>,
}

impl MergeEngine {
    pub fn new(
        table: u32,
        store: Arc<RwLock<PageStore>>,
        pool: Arc<BufferPool>,
        batch_size: usize,
        threshold: u64,
    ) -> Self {
        Self {
            table,
            store,
            pool,
            batch_size: batch_size as u64,
            threshold,
            tps: AtomicU64::new(0),
            pending: AtomicU64::new(0),
            run_lock: Mutex::new(()),
        }
    }

    /// Count one tail write. Returns true when the threshold was crossed and
    /// a pass should be scheduled.
    pub fn record_tail_write(&self) -> bool {
        if self.threshold == 0 {
            return false;
        }
        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if pending >= self.threshold {
            self.pending.store(0, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Run one pass of up to `batch_size` tail records from the cursor.
    ///
    /// Steps:
    /// 1. Map each ordinal to its tail slot; stop at the first missing slot
    /// 2. Locate the base slot of the delta's BaseID
    /// 3. Copy each changed column into the working copy of that base page
    /// 4. Install the working copy and advance TPS
    ///
    /// A failed step is logged and counted; the cursor still moves past it.
    pub fn merge(&self) -> Result<MergeReport> {
        let _pass = self.run_lock.lock();
        let start = self.tps.load(Ordering::SeqCst);
        debug!(table = self.table, tps = start, "merge pass started");

        let mut working: BTreeMap<(usize, usize), WorkingPage> = BTreeMap::new();
        let mut report = MergeReport {
            tps: start,
            ..MergeReport::default()
        };

        for ordinal in start..start + self.batch_size {
            // Step 1: Read the tail record at this ordinal
            let tail = {
                let store = self.store.read();
                store.tail_row_at(store.tail_location(ordinal))
            };
            let Some(tail) = tail else {
                break;
            };

            // Steps 2-3: Fold it into the working copy
            if let Err(e) = self.merge_step(ordinal, &tail, &mut working) {
                warn!(table = self.table, ordinal, error = %e, "merge step failed");
                report.failed += 1;
            }
            report.processed += 1;
        }

        // Step 4: Install and advance
        if !working.is_empty() {
            {
                let mut store = self.store.write();
                for ((range, page), merged) in &working {
                    store.install_merged(*range, *page, &merged.copy)?;
                }
            }
            for (range, page) in working.keys() {
                self.pool.touch(PageId::base(self.table, *range, *page))?;
            }
        }

        report.tps = start + report.processed;
        self.tps.store(report.tps, Ordering::SeqCst);
        info!(
            table = self.table,
            processed = report.processed,
            failed = report.failed,
            pages = working.len(),
            tps = report.tps,
            "merge pass finished"
        );
        Ok(report)
    }

    fn merge_step(
        &self,
        ordinal: u64,
        tail: &TailRow,
        working: &mut BTreeMap<(usize, usize), WorkingPage>,
    ) -> Result<()> {
        let step_error = |reason: String| LStoreError::MergeStep { ordinal, reason };

        let location = {
            let store = self.store.read();
            let location = store
                .base_location(tail.base_rid)
                .ok_or_else(|| step_error(format!("unknown base rid {}", tail.base_rid)))?;
            let live = store.base_page(location.range, location.page).ok_or_else(|| {
                step_error(format!("missing base page {}/{}", location.range, location.page))
            })?;
            match working.get_mut(&(location.range, location.page)) {
                // Rows were appended to the live page after it was cloned
                Some(page) if location.slot >= page.copy.len() => {
                    page.refresh(live).map_err(|e| step_error(e.to_string()))?;
                    debug!(
                        table = self.table,
                        range = location.range,
                        page = location.page,
                        slot = location.slot,
                        "refreshed working copy"
                    );
                }
                Some(_) => {}
                None => {
                    working.insert((location.range, location.page), WorkingPage::new(live.clone()));
                }
            }
            location
        };

        let page = working
            .get_mut(&(location.range, location.page))
            .ok_or_else(|| step_error("working copy vanished".to_string()))?;
        for column in tail.schema.changed_columns() {
            let value = tail
                .columns
                .get(column)
                .copied()
                .ok_or_else(|| step_error(format!("tail row lacks column {}", column)))?;
            page.set(column, location.slot, value)
                .map_err(|e| step_error(e.to_string()))?;
        }
        Ok(())
    }

    // =========================================================================
    // Checkpoint
    // =========================================================================

    pub fn checkpoint(&self) -> MergeCheckpoint {
        MergeCheckpoint {
            tps: self.tps.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
        }
    }

    /// Resume from a persisted checkpoint, never past the tail records that exist
    pub fn restore(&self, checkpoint: MergeCheckpoint) {
        let written = self.store.read().tail_record_count();
        let tps = if checkpoint.tps > written {
            warn!(
                table = self.table,
                tps = checkpoint.tps,
                written,
                "checkpoint ahead of tail records, clamping"
            );
            written
        } else {
            checkpoint.tps
        };
        self.tps.store(tps, Ordering::SeqCst);
        self.pending.store(checkpoint.pending, Ordering::SeqCst);
    }

    pub fn tps(&self) -> u64 {
        self.tps.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}
