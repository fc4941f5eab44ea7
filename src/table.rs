//! Table Module
//!
//! Record versioning over the page store.
//!
//! ## Responsibilities
//! - Insert base records, append tail versions on update
//! - Keep the Record Directory and Index in step with every mutation
//! - Serialize mutations of one key through the lock table
//! - Trigger merges and track dirty pages in the buffer pool
//! - Persist and reload the table's full state

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::buffer::{BufferPool, PageId};
use crate::config::{Config, MergeMode};
use crate::directory::{ProjectedRecord, Record, RecordDirectory};
use crate::error::{LStoreError, Result};
use crate::index::Index;
use crate::lock::{KeyLockGuard, LockTable, OwnerId};
use crate::merge::{MergeEngine, MergeReport, MergeWorker};
use crate::page::{PageStore, Rid, SchemaEncoding, TailRow, TailWrite, Value, MAX_COLUMNS};
use crate::storage::{TableFiles, TableInfo};

/// One L-Store table
///
/// ## Write Path
/// ```text
/// insert: lock key → base page → Index → Directory
/// update: lock key → resolve indirection → tail page → base Indirection → Index → Directory
/// delete: lock key → Directory → Index
/// ```
/// Every fallible step runs before the Index is touched, so a failed
/// operation leaves no partial state behind.
pub struct Table {
    id: u32,
    name: String,
    num_columns: usize,
    key_index: usize,
    merge_mode: MergeMode,

    /// Physical pages, shared with the merge engine and the file set
    store: Arc<RwLock<PageStore>>,

    directory: RecordDirectory,
    index: RwLock<Index>,
    locks: LockTable,
    pool: Arc<BufferPool>,
    files: Arc<TableFiles>,
    merger: Arc<MergeEngine>,
    worker: Mutex<Option<MergeWorker>>,
    next_owner: AtomicU64,
}

impl Table {
    /// Create an empty table in `dir` and write its `table_info`
    pub fn create(
        id: u32,
        name: &str,
        num_columns: usize,
        key_index: usize,
        dir: &Path,
        config: &Config,
    ) -> Result<Self> {
        check_shape(num_columns, key_index)?;
        fs::create_dir_all(dir)?;

        let info = TableInfo {
            name: name.to_string(),
            num_columns,
            key_index,
        };
        let table = Self::assemble(id, &info, dir, config)?;
        table.files.write_table_info(&info)?;
        info!(table = name, num_columns, key_index, "created table");
        Ok(table)
    }

    /// Reload a table from its directory
    ///
    /// Order:
    /// 1. table_info
    /// 2. page_directory
    /// 3. index (rebuilt from the directory if never written)
    /// 4. base pages, then tail pages
    /// 5. merge checkpoint (a corrupt one restarts the cursor at 0)
    pub fn open(id: u32, dir: &Path, config: &Config) -> Result<Self> {
        // Step 1: Table shape
        let info = TableFiles::read_table_info(dir)?;
        check_shape(info.num_columns, info.key_index)?;
        let table = Self::assemble(id, &info, dir, config)?;

        // Step 2: Record directory
        let records = table.files.read_directory(info.num_columns)?;
        for record in records.into_iter().filter(|r| r.valid) {
            table.directory.insert(record);
        }

        // Step 3: Index
        let index = match table.files.read_index()? {
            Some(index) if index.num_columns() == info.num_columns => index,
            Some(index) => {
                return Err(LStoreError::Corruption(format!(
                    "index has {} columns, table has {}",
                    index.num_columns(),
                    info.num_columns
                )))
            }
            None => {
                let mut index = Index::new(info.num_columns);
                for record in table.directory.snapshot() {
                    index.add_record(record.rid, &record.columns);
                }
                index
            }
        };
        *table.index.write() = index;

        // Step 4: Pages
        {
            let mut store = table.store.write();
            for row in table.files.read_base_rows(info.num_columns)? {
                store.restore_base(&row)?;
            }
            for row in table.files.read_tail_rows(info.num_columns)? {
                store.restore_tail(&row)?;
            }
        }

        // Step 5: Merge cursor
        match table.files.read_checkpoint() {
            Ok(Some(checkpoint)) => table.merger.restore(checkpoint),
            Ok(None) => {}
            Err(LStoreError::Corruption(reason)) => {
                warn!(table = %info.name, %reason, "discarding merge checkpoint, TPS restarts at 0");
            }
            Err(e) => return Err(e),
        }

        info!(
            table = %info.name,
            records = table.directory.len(),
            base_pages = table.base_page_count(),
            tail_records = table.tail_record_count(),
            tps = table.tps(),
            "opened table"
        );
        Ok(table)
    }

    fn assemble(id: u32, info: &TableInfo, dir: &Path, config: &Config) -> Result<Self> {
        let store = Arc::new(RwLock::new(PageStore::new(
            info.num_columns,
            info.key_index,
            config.page_capacity,
            config.pages_per_range,
        )));
        let files = Arc::new(TableFiles::new(dir, id, Arc::clone(&store)));
        let pool = Arc::new(BufferPool::with_policy(
            config.bufferpool_size,
            config.eviction_policy,
            config.eviction_seed,
            files.clone(),
        ));
        let merger = Arc::new(MergeEngine::new(
            id,
            Arc::clone(&store),
            Arc::clone(&pool),
            config.merge_batch_size,
            config.merge_threshold as u64,
        ));
        let worker = match config.merge_mode {
            MergeMode::Background => Some(MergeWorker::spawn(&info.name, Arc::clone(&merger))?),
            MergeMode::Inline => None,
        };

        Ok(Self {
            id,
            name: info.name.clone(),
            num_columns: info.num_columns,
            key_index: info.key_index,
            merge_mode: config.merge_mode,
            store,
            directory: RecordDirectory::new(),
            index: RwLock::new(Index::new(info.num_columns)),
            locks: LockTable::new(),
            pool,
            files,
            merger,
            worker: Mutex::new(worker),
            next_owner: AtomicU64::new(1),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a new record; the key column must not already exist
    pub fn insert(&self, columns: &[Value]) -> Result<Rid> {
        // Step 1: Validate before touching anything shared
        self.check_arity(columns.len())?;
        let key = columns[self.key_index];
        let _guard = self.lock_key(key)?;
        if !self.index.read().locate(self.key_index, key).is_empty() {
            return Err(LStoreError::Malformed(format!("duplicate primary key {}", key)));
        }

        // Step 2: Base page
        let (rid, location) = self.store.write().insert_base(columns)?;

        // Step 3: Index and Directory
        self.index.write().add_record(rid, columns);
        self.directory.insert(Record::new(rid, key, columns.to_vec()));

        self.track(PageId::base(self.id, location.range, location.page));
        debug!(table = %self.name, rid, key, "inserted record");
        Ok(rid)
    }

    /// Append a new version of `key`. `None` columns keep their value.
    ///
    /// Returns the RID of the tail record written. Schema-Encoding bit i is
    /// set iff `columns[i]` is `Some`.
    pub fn update(&self, key: Value, columns: &[Option<Value>]) -> Result<Rid> {
        // Step 1: Validate
        self.check_arity(columns.len())?;
        if let Some(new_key) = columns[self.key_index] {
            if new_key != key {
                return Err(LStoreError::Malformed(format!(
                    "primary key {} cannot be rewritten to {}",
                    key, new_key
                )));
            }
        }
        let _guard = self.lock_key(key)?;

        // Step 2: Current version
        let base_rid = self.base_rid_of(key)?;
        let current = self
            .directory
            .get(base_rid)
            .ok_or_else(|| LStoreError::NotFound(format!("rid {} for key {}", base_rid, key)))?;
        let row: Vec<Value> = current
            .columns
            .iter()
            .zip(columns)
            .map(|(old, new)| new.unwrap_or(*old))
            .collect();
        let schema = SchemaEncoding::from_update(columns);

        // Step 3: Tail record and base Indirection
        let (tail_rid, tail_location, base_location) = {
            let mut store = self.store.write();
            let base_location = store
                .base_location(base_rid)
                .ok_or_else(|| LStoreError::NotFound(format!("base rid {}", base_rid)))?;
            let previous = store
                .latest_tail_rid(base_location.range, key, base_rid)
                .unwrap_or(base_rid);
            let (tail_rid, tail_location) = store.insert_tail(
                base_location.range,
                &TailWrite {
                    columns: &row,
                    indirection: previous,
                    schema,
                    base_rid,
                },
            )?;
            store.set_base_indirection(base_rid, tail_rid)?;
            (tail_rid, tail_location, base_location)
        };

        // Step 4: Index and Directory
        {
            let mut index = self.index.write();
            for column in schema.changed_columns() {
                if current.columns[column] != row[column] {
                    index.remove(column, current.columns[column], base_rid);
                    index.add(column, row[column], base_rid);
                }
            }
        }
        self.directory.update_columns(base_rid, row);

        self.track(PageId::tail(self.id, tail_location.range, tail_location.page));
        self.track(PageId::base(self.id, base_location.range, base_location.page));
        debug!(table = %self.name, key, base_rid, tail_rid, schema = %schema, "updated record");

        // Step 5: Merge trigger
        if self.merger.record_tail_write() {
            self.schedule_merge();
        }
        Ok(tail_rid)
    }

    /// Logically delete `key`; its page slots are kept
    pub fn delete(&self, key: Value) -> Result<()> {
        let _guard = self.lock_key(key)?;
        let base_rid = self.base_rid_of(key)?;
        let record = self
            .directory
            .remove(base_rid)
            .ok_or_else(|| LStoreError::NotFound(format!("rid {} for key {}", base_rid, key)))?;
        self.index.write().remove_record(base_rid, &record.columns);
        debug!(table = %self.name, key, rid = base_rid, "deleted record");
        Ok(())
    }

    /// Add one to a single column of `key` through the normal update path
    pub fn increment(&self, key: Value, column: usize) -> Result<Rid> {
        self.check_column(column)?;
        let base_rid = self.base_rid_of(key)?;
        let current = self
            .directory
            .get(base_rid)
            .ok_or_else(|| LStoreError::NotFound(format!("key {}", key)))?;
        let next = current.columns[column].checked_add(1).ok_or_else(|| {
            LStoreError::Malformed(format!("column {} of key {} would overflow", column, key))
        })?;
        let mut columns = vec![None; self.num_columns];
        columns[column] = Some(next);
        self.update(key, &columns)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Records whose `column` equals `search_key`, projected by `mask`
    ///
    /// The owning base page stays pinned while its record is read.
    pub fn select(&self, search_key: Value, column: usize, mask: &[u8]) -> Result<Vec<ProjectedRecord>> {
        let rids = self.locate(column, search_key)?;
        let mut found = Vec::with_capacity(rids.len());
        for rid in rids {
            let location = self.store.read().base_location(rid);
            let page = location.map(|l| PageId::base(self.id, l.range, l.page));
            if let Some(page) = page {
                if let Err(e) = self.pool.access_pinned(page) {
                    error!(table = %self.name, %page, error = %e, "buffer pool access failed");
                }
            }

            if let Some(record) = self.directory.get(rid) {
                found.push(record.project(mask));
            }

            if let Some(page) = page {
                self.pool.unpin(page);
            }
        }

        if found.is_empty() {
            return Err(LStoreError::NotFound(format!(
                "no record with column {} = {}",
                column, search_key
            )));
        }
        Ok(found)
    }

    /// RIDs whose `column` equals `value`; unindexed columns are scanned
    pub fn locate(&self, column: usize, value: Value) -> Result<Vec<Rid>> {
        self.check_column(column)?;
        let index = self.index.read();
        if index.is_indexed(column) {
            Ok(index.locate(column, value))
        } else {
            Ok(self.directory.scan(column, value))
        }
    }

    /// RIDs whose `column` lies in `[begin, end]`
    ///
    /// Indexed columns probe every integer in the interval.
    pub fn locate_range(&self, column: usize, begin: Value, end: Value) -> Result<Vec<Rid>> {
        self.check_column(column)?;
        let index = self.index.read();
        if index.is_indexed(column) {
            Ok(index.locate_range(column, begin, end))
        } else {
            Ok(self.directory.scan_range(column, begin, end))
        }
    }

    /// Newest version RID of `key`: the latest tail record in its page range,
    /// or the base RID if it was never updated
    pub fn resolve_indirection(&self, key: Value) -> Result<Rid> {
        let base_rid = self.base_rid_of(key)?;
        let store = self.store.read();
        let location = store
            .base_location(base_rid)
            .ok_or_else(|| LStoreError::NotFound(format!("base rid {}", base_rid)))?;
        Ok(store
            .latest_tail_rid(location.range, key, base_rid)
            .unwrap_or(base_rid))
    }

    // =========================================================================
    // Index Management
    // =========================================================================

    /// Build an index for `column` from the Directory. No-op if it exists.
    pub fn create_index(&self, column: usize) -> Result<()> {
        self.check_column(column)?;
        let mut index = self.index.write();
        if index.is_indexed(column) {
            return Ok(());
        }
        index.create_index(column, self.directory.column_entries(column));
        info!(table = %self.name, column, "created index");
        Ok(())
    }

    /// Stop maintaining the index of `column`
    pub fn drop_index(&self, column: usize) -> Result<()> {
        self.check_column(column)?;
        if column == self.key_index {
            return Err(LStoreError::Malformed(
                "the primary key index cannot be dropped".to_string(),
            ));
        }
        self.index.write().drop_index(column);
        info!(table = %self.name, column, "dropped index");
        Ok(())
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        self.index.read().is_indexed(column)
    }

    // =========================================================================
    // Merge & Persistence
    // =========================================================================

    /// Run one merge pass now
    pub fn merge(&self) -> Result<MergeReport> {
        self.merger.merge()
    }

    fn schedule_merge(&self) {
        match self.merge_mode {
            MergeMode::Inline => {
                if let Err(e) = self.merger.merge() {
                    error!(table = %self.name, error = %e, "inline merge failed");
                }
            }
            MergeMode::Background => {
                let requested = self.worker.lock().as_ref().map_or(false, MergeWorker::request);
                if !requested {
                    warn!(table = %self.name, "merge worker unavailable, merge skipped");
                }
            }
        }
    }

    /// Write every piece of table state to its files
    pub fn persist(&self) -> Result<()> {
        let pages = self.pool.flush_all()?;
        self.files.write_directory(&self.directory.snapshot())?;
        self.files.write_index(&self.index.read())?;
        self.files.write_checkpoint(&self.merger.checkpoint())?;
        self.files.write_table_info(&TableInfo {
            name: self.name.clone(),
            num_columns: self.num_columns,
            key_index: self.key_index,
        })?;
        debug!(table = %self.name, pages, records = self.directory.len(), "persisted table");
        Ok(())
    }

    /// Stop the merge worker, then persist
    pub fn close(&self) -> Result<()> {
        self.stop_merge_worker();
        self.persist()
    }

    /// Join the background merge worker, if any. Later triggers are skipped.
    pub fn stop_merge_worker(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.shutdown();
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock_key(&self, key: Value) -> Result<KeyLockGuard<'_>> {
        let owner: OwnerId = self.next_owner.fetch_add(1, Ordering::Relaxed);
        self.locks.try_lock(key, owner).ok_or(LStoreError::Locked(key))
    }

    fn base_rid_of(&self, key: Value) -> Result<Rid> {
        self.index
            .read()
            .locate(self.key_index, key)
            .first()
            .copied()
            .ok_or_else(|| LStoreError::NotFound(format!("key {}", key)))
    }

    fn track(&self, page: PageId) {
        if let Err(e) = self.pool.touch(page) {
            error!(table = %self.name, %page, error = %e, "buffer pool write-back failed");
        }
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

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.num_columns {
            return Err(LStoreError::Malformed(format!(
                "column {} out of range (table has {})",
                column, self.num_columns
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn dir(&self) -> &Path {
        self.files.dir()
    }

    pub fn tps(&self) -> u64 {
        self.merger.tps()
    }

    /// Live records in the Directory
    pub fn record_count(&self) -> usize {
        self.directory.len()
    }

    pub fn base_page_count(&self) -> usize {
        self.store.read().base_page_count()
    }

    pub fn page_range_count(&self) -> usize {
        self.store.read().range_count()
    }

    pub fn tail_record_count(&self) -> u64 {
        self.store.read().tail_record_count()
    }

    /// User columns stored in the base page slot of `rid`, bypassing the
    /// Directory. After a merge covers every update of `rid` this matches
    /// what `select` returns.
    pub fn read_base_slot(&self, rid: Rid) -> Option<Vec<Value>> {
        self.store.read().base_row(rid).map(|row| row.columns)
    }

    /// Indirection of the base record `rid`
    pub fn read_base_indirection(&self, rid: Rid) -> Option<Rid> {
        self.store.read().base_row(rid).map(|row| row.indirection)
    }

    pub fn read_tail_row(&self, rid: Rid) -> Option<TailRow> {
        self.store.read().tail_row(rid)
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }
}

/// `1 <= num_columns <= 64` and the key column must exist
fn check_shape(num_columns: usize, key_index: usize) -> Result<()> {
    if num_columns == 0 || num_columns > MAX_COLUMNS {
        return Err(LStoreError::Config(format!(
            "num_columns must be in 1..={}, got {}",
            MAX_COLUMNS, num_columns
        )));
    }
    if key_index >= num_columns {
        return Err(LStoreError::Config(format!(
            "key_index {} out of range for {} columns",
            key_index, num_columns
        )));
    }
    Ok(())
}
