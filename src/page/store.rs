//! Page store
//!
//! Owns every page range of one table plus the two RID counters.

use tracing::debug;

use crate::error::{LStoreError, Result};

use super::{
    now_millis, BasePage, BaseRow, PageLocation, PageRange, Rid, SchemaEncoding, TailPage,
    TailRow, Value,
};

/// Version metadata for a tail write (the RID and timestamp are assigned by the store)
#[derive(Debug, Clone)]
pub struct TailWrite<'a> {
    /// The full new row: unchanged columns carry the previous value forward
    pub columns: &'a [Value],
    /// RID of the version this one supersedes
    pub indirection: Rid,
    pub schema: SchemaEncoding,
    pub base_rid: Rid,
}

/// Physical storage of one table
///
/// Base RIDs are dense and allocated in insertion order, so a base RID maps
/// to its slot arithmetically: position `rid - 1` in range-major, page-major
/// order. Tail RIDs count down from -1 across all ranges.
#[derive(Debug, Clone)]
pub struct PageStore {
    num_columns: usize,
    key_index: usize,
    page_capacity: usize,
    pages_per_range: usize,
    ranges: Vec<PageRange>,
    current_range: usize,
    current_base_page: usize,
    next_base_rid: Rid,
    next_tail_rid: Rid,
    tail_records: u64,
}

impl PageStore {
    pub fn new(
        num_columns: usize,
        key_index: usize,
        page_capacity: usize,
        pages_per_range: usize,
    ) -> Self {
        Self {
            num_columns,
            key_index,
            page_capacity,
            pages_per_range,
            ranges: Vec::new(),
            current_range: 0,
            current_base_page: 0,
            next_base_rid: 1,
            next_tail_rid: -1,
            tail_records: 0,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append a new base record; Indirection points at itself and no column
    /// is marked changed.
    pub fn insert_base(&mut self, columns: &[Value]) -> Result<(Rid, PageLocation)> {
        self.check_arity(columns.len())?;
        let rid = self.next_base_rid;
        let row = BaseRow {
            rid,
            indirection: rid,
            schema: SchemaEncoding::empty(self.num_columns),
            timestamp: now_millis(),
            columns: columns.to_vec(),
        };
        self.append_base(&row)
    }

    /// Replay a persisted base row with its original RID
    pub fn restore_base(&mut self, row: &BaseRow) -> Result<PageLocation> {
        if row.rid != self.next_base_rid {
            return Err(LStoreError::Corruption(format!(
                "base rows out of order: expected rid {}, found {}",
                self.next_base_rid, row.rid
            )));
        }
        self.check_arity(row.columns.len())?;
        self.append_base(row).map(|(_, location)| location)
    }

    fn append_base(&mut self, row: &BaseRow) -> Result<(Rid, PageLocation)> {
        let (range, page) = self.prepare_base_page();
        let slot = self.ranges[range].base_pages[page].push(row)?;
        self.next_base_rid += 1;
        Ok((row.rid, PageLocation { range, page, slot }))
    }

    /// Make sure the current base page has room, rolling the page range over
    /// before the page when both are full.
    fn prepare_base_page(&mut self) -> (usize, usize) {
        if self.ranges.is_empty() {
            self.ranges
                .push(PageRange::new(self.num_columns, self.page_capacity));
            self.current_range = 0;
            self.current_base_page = 0;
        }

        let range = &self.ranges[self.current_range];
        if range.base_page_count() >= self.pages_per_range
            && range.base_pages[self.current_base_page].is_full()
        {
            self.ranges
                .push(PageRange::new(self.num_columns, self.page_capacity));
            self.current_range += 1;
            self.current_base_page = 0;
            debug!(range = self.current_range, "page range rollover");
        }

        let range = &mut self.ranges[self.current_range];
        if range.base_pages[self.current_base_page].is_full() {
            range
                .base_pages
                .push(BasePage::new(self.num_columns, self.page_capacity));
            self.current_base_page += 1;
            debug!(
                range = self.current_range,
                page = self.current_base_page,
                "base page rollover"
            );
        }

        (self.current_range, self.current_base_page)
    }

    /// Append a delta to the newest tail page of `range`
    pub fn insert_tail(&mut self, range: usize, write: &TailWrite<'_>) -> Result<(Rid, PageLocation)> {
        self.check_arity(write.columns.len())?;
        let row = TailRow {
            rid: self.next_tail_rid,
            indirection: write.indirection,
            schema: write.schema,
            timestamp: now_millis(),
            base_rid: write.base_rid,
            columns: write.columns.to_vec(),
        };
        self.append_tail(range, &row)
    }

    /// Replay a persisted tail row into the range of its base record
    pub fn restore_tail(&mut self, row: &TailRow) -> Result<PageLocation> {
        if row.rid != self.next_tail_rid {
            return Err(LStoreError::Corruption(format!(
                "tail rows out of order: expected rid {}, found {}",
                self.next_tail_rid, row.rid
            )));
        }
        self.check_arity(row.columns.len())?;
        let range = self
            .base_location(row.base_rid)
            .ok_or_else(|| {
                LStoreError::Corruption(format!(
                    "tail rid {} references unknown base rid {}",
                    row.rid, row.base_rid
                ))
            })?
            .range;
        self.append_tail(range, row).map(|(_, location)| location)
    }

    fn append_tail(&mut self, range: usize, row: &TailRow) -> Result<(Rid, PageLocation)> {
        let capacity = self.page_capacity;
        let num_columns = self.num_columns;
        let page_range = self
            .ranges
            .get_mut(range)
            .ok_or_else(|| LStoreError::NotFound(format!("page range {}", range)))?;

        if page_range.tail_pages.last().map_or(true, TailPage::is_full) {
            page_range.tail_pages.push(TailPage::new(num_columns, capacity));
            debug!(range, pages = page_range.tail_pages.len(), "tail page rollover");
        }
        let page = page_range.tail_pages.len() - 1;
        let slot = page_range.tail_pages[page].push(row)?;

        self.next_tail_rid -= 1;
        self.tail_records += 1;
        Ok((row.rid, PageLocation { range, page, slot }))
    }

    /// Point a base record at its newest version
    pub fn set_base_indirection(&mut self, base_rid: Rid, indirection: Rid) -> Result<()> {
        let location = self
            .base_location(base_rid)
            .ok_or_else(|| LStoreError::NotFound(format!("base rid {}", base_rid)))?;
        self.ranges[location.range].base_pages[location.page]
            .set_indirection(location.slot, indirection)
    }

    /// Copy merged user columns from a working copy onto the live page
    pub fn install_merged(&mut self, range: usize, page: usize, merged: &BasePage) -> Result<()> {
        let live = self
            .ranges
            .get_mut(range)
            .and_then(|r| r.base_pages.get_mut(page))
            .ok_or_else(|| LStoreError::NotFound(format!("base page {}/{}", range, page)))?;
        live.install_user_columns(merged);
        Ok(())
    }

    fn check_arity(&self, got: usize) -> Result<()> {
        if got != self.num_columns {
            return Err(LStoreError::Malformed(format!(
                "expected {} columns, got {}",
                self.num_columns, got
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// RID of the newest tail record in `range` for (`key`, `base_rid`),
    /// scanning tail pages newest first. None if the record was never updated.
    pub fn latest_tail_rid(&self, range: usize, key: Value, base_rid: Rid) -> Option<Rid> {
        let page_range = self.ranges.get(range)?;
        for page in page_range.tail_pages.iter().rev() {
            let keys = page.column(self.key_index);
            let bases = page.base_rids();
            for slot in (0..page.len()).rev() {
                if keys[slot] == key && bases[slot] == base_rid {
                    return Some(page.rids()[slot]);
                }
            }
        }
        None
    }

    /// Where a base RID lives, by arithmetic on the dense RID sequence
    pub fn base_location(&self, rid: Rid) -> Option<PageLocation> {
        if rid < 1 || rid >= self.next_base_rid {
            return None;
        }
        let position = (rid - 1) as usize;
        Some(PageLocation {
            range: position / self.records_per_range(),
            page: (position / self.page_capacity) % self.pages_per_range,
            slot: position % self.page_capacity,
        })
    }

    /// Tail position of the `ordinal`-th tail record as the merge cursor sees it
    pub fn tail_location(&self, ordinal: u64) -> PageLocation {
        let ordinal = ordinal as usize;
        PageLocation {
            range: ordinal / self.records_per_range(),
            page: (ordinal / self.page_capacity) % self.pages_per_range,
            slot: ordinal % self.page_capacity,
        }
    }

    pub fn base_row(&self, rid: Rid) -> Option<BaseRow> {
        let location = self.base_location(rid)?;
        self.base_page(location.range, location.page)?
            .row(location.slot)
    }

    pub fn tail_row_at(&self, location: PageLocation) -> Option<TailRow> {
        self.tail_page(location.range, location.page)?
            .row(location.slot)
    }

    /// Find a tail record by RID (linear over the tail pages)
    pub fn tail_row(&self, rid: Rid) -> Option<TailRow> {
        for range in &self.ranges {
            for page in &range.tail_pages {
                if let Some(slot) = page.rids().iter().position(|&r| r == rid) {
                    return page.row(slot);
                }
            }
        }
        None
    }

    pub fn base_page(&self, range: usize, page: usize) -> Option<&BasePage> {
        self.ranges.get(range)?.base_pages.get(page)
    }

    pub fn tail_page(&self, range: usize, page: usize) -> Option<&TailPage> {
        self.ranges.get(range)?.tail_pages.get(page)
    }

    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn page_capacity(&self) -> usize {
        self.page_capacity
    }

    pub fn pages_per_range(&self) -> usize {
        self.pages_per_range
    }

    pub fn records_per_range(&self) -> usize {
        self.page_capacity * self.pages_per_range
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn base_page_count(&self) -> usize {
        self.ranges.iter().map(PageRange::base_page_count).sum()
    }

    pub fn base_record_count(&self) -> u64 {
        (self.next_base_rid - 1) as u64
    }

    pub fn tail_record_count(&self) -> u64 {
        self.tail_records
    }

    pub fn next_base_rid(&self) -> Rid {
        self.next_base_rid
    }

    pub fn next_tail_rid(&self) -> Rid {
        self.next_tail_rid
    }
}
