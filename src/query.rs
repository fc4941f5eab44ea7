//! Query Module
//!
//! Consumer-facing operations over one table. Every call reports failure as
//! `false` or `None`; errors are logged here and never returned.

use tracing::{debug, warn};

use crate::directory::ProjectedRecord;
use crate::error::LStoreError;
use crate::page::{Rid, Value};
use crate::table::Table;

/// Failure-as-value facade over a `Table`
pub struct Query<'a> {
    table: &'a Table,
}

impl<'a> Query<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    pub fn insert(&self, columns: &[Value]) -> bool {
        self.table.insert(columns).map_err(|e| self.report("insert", e)).is_ok()
    }

    pub fn update(&self, key: Value, columns: &[Option<Value>]) -> bool {
        self.table
            .update(key, columns)
            .map_err(|e| self.report("update", e))
            .is_ok()
    }

    pub fn delete(&self, key: Value) -> bool {
        self.table.delete(key).map_err(|e| self.report("delete", e)).is_ok()
    }

    /// Matching records, or `None` when nothing matched or the call failed
    pub fn select(&self, search_key: Value, column: usize, mask: &[u8]) -> Option<Vec<ProjectedRecord>> {
        self.table
            .select(search_key, column, mask)
            .map_err(|e| self.report("select", e))
            .ok()
    }

    pub fn increment(&self, key: Value, column: usize) -> bool {
        self.table
            .increment(key, column)
            .map_err(|e| self.report("increment", e))
            .is_ok()
    }

    pub fn locate(&self, column: usize, value: Value) -> Option<Vec<Rid>> {
        self.table
            .locate(column, value)
            .map_err(|e| self.report("locate", e))
            .ok()
    }

    pub fn locate_range(&self, column: usize, begin: Value, end: Value) -> Option<Vec<Rid>> {
        self.table
            .locate_range(column, begin, end)
            .map_err(|e| self.report("locate_range", e))
            .ok()
    }

    /// Expected conditions (missing key, held lock) log at debug level
    fn report(&self, op: &'static str, e: LStoreError) {
        if e.is_not_found() || e.is_locked() {
            debug!(table = self.table.name(), op, error = %e, "query failed");
        } else {
            warn!(table = self.table.name(), op, error = %e, "query failed");
        }
    }
}
