//! Base and tail pages
//!
//! A page is a fixed-capacity set of parallel column arrays. User columns are
//! indexed by position; metadata columns are named fields.

use crate::error::{LStoreError, Result};

use super::{Rid, SchemaEncoding, Value};

/// One record as stored on a base page
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRow {
    pub rid: Rid,
    pub indirection: Rid,
    pub schema: SchemaEncoding,
    pub timestamp: u64,
    pub columns: Vec<Value>,
}

/// One delta version as stored on a tail page
#[derive(Debug, Clone, PartialEq)]
pub struct TailRow {
    pub rid: Rid,
    pub indirection: Rid,
    pub schema: SchemaEncoding,
    pub timestamp: u64,
    pub base_rid: Rid,
    pub columns: Vec<Value>,
}

/// Columns every version-bearing page carries
#[derive(Debug, Clone)]
struct VersionColumns {
    capacity: usize,
    columns: Vec<Vec<Value>>,
    rid: Vec<Rid>,
    indirection: Vec<Rid>,
    schema: Vec<SchemaEncoding>,
    timestamp: Vec<u64>,
}

impl VersionColumns {
    fn new(num_columns: usize, capacity: usize) -> Self {
        Self {
            capacity,
            columns: (0..num_columns).map(|_| Vec::with_capacity(capacity)).collect(),
            rid: Vec::with_capacity(capacity),
            indirection: Vec::with_capacity(capacity),
            schema: Vec::with_capacity(capacity),
            timestamp: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.rid.len()
    }

    /// Arity and capacity are checked before any column is touched
    fn check_push(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(LStoreError::Malformed(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        if self.len() >= self.capacity {
            return Err(LStoreError::Malformed(format!(
                "page is full ({} records)",
                self.capacity
            )));
        }
        Ok(())
    }

    fn push(
        &mut self,
        rid: Rid,
        indirection: Rid,
        schema: SchemaEncoding,
        timestamp: u64,
        values: &[Value],
    ) -> usize {
        let slot = self.len();
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(*value);
        }
        self.rid.push(rid);
        self.indirection.push(indirection);
        self.schema.push(schema);
        self.timestamp.push(timestamp);
        slot
    }

    fn values(&self, slot: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c[slot]).collect()
    }
}

// =============================================================================
// Base Page
// =============================================================================

/// Columnar page of original records
#[derive(Debug, Clone)]
pub struct BasePage {
    inner: VersionColumns,
}

impl BasePage {
    pub fn new(num_columns: usize, capacity: usize) -> Self {
        Self {
            inner: VersionColumns::new(num_columns, capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.inner.capacity
    }

    pub fn num_columns(&self) -> usize {
        self.inner.columns.len()
    }

    /// Append a row, returning its slot
    pub fn push(&mut self, row: &BaseRow) -> Result<usize> {
        self.inner.check_push(&row.columns)?;
        Ok(self
            .inner
            .push(row.rid, row.indirection, row.schema, row.timestamp, &row.columns))
    }

    pub fn row(&self, slot: usize) -> Option<BaseRow> {
        if slot >= self.len() {
            return None;
        }
        Some(BaseRow {
            rid: self.inner.rid[slot],
            indirection: self.inner.indirection[slot],
            schema: self.inner.schema[slot],
            timestamp: self.inner.timestamp[slot],
            columns: self.inner.values(slot),
        })
    }

    pub fn value(&self, column: usize, slot: usize) -> Option<Value> {
        self.inner.columns.get(column)?.get(slot).copied()
    }

    /// Overwrite one user column value in place
    pub fn set_value(&mut self, column: usize, slot: usize, value: Value) -> Result<()> {
        let cell = self
            .inner
            .columns
            .get_mut(column)
            .and_then(|c| c.get_mut(slot))
            .ok_or_else(|| {
                LStoreError::Malformed(format!("no base cell at column {} slot {}", column, slot))
            })?;
        *cell = value;
        Ok(())
    }

    pub fn set_indirection(&mut self, slot: usize, rid: Rid) -> Result<()> {
        let cell = self.inner.indirection.get_mut(slot).ok_or_else(|| {
            LStoreError::Malformed(format!("no base slot {}", slot))
        })?;
        *cell = rid;
        Ok(())
    }

    /// Copy the user columns of `merged` over the matching prefix of this page
    pub fn install_user_columns(&mut self, merged: &BasePage) {
        for (live, copy) in self.inner.columns.iter_mut().zip(&merged.inner.columns) {
            let n = copy.len().min(live.len());
            live[..n].copy_from_slice(&copy[..n]);
        }
    }

    pub fn column(&self, column: usize) -> &[Value] {
        &self.inner.columns[column]
    }

    pub fn rids(&self) -> &[Rid] {
        &self.inner.rid
    }

    pub fn indirections(&self) -> &[Rid] {
        &self.inner.indirection
    }

    pub fn schemas(&self) -> &[SchemaEncoding] {
        &self.inner.schema
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.inner.timestamp
    }
}

// =============================================================================
// Tail Page
// =============================================================================

/// Columnar page of update deltas
#[derive(Debug, Clone)]
pub struct TailPage {
    inner: VersionColumns,
    base_rid: Vec<Rid>,
}

impl TailPage {
    pub fn new(num_columns: usize, capacity: usize) -> Self {
        Self {
            inner: VersionColumns::new(num_columns, capacity),
            base_rid: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.inner.capacity
    }

    pub fn push(&mut self, row: &TailRow) -> Result<usize> {
        self.inner.check_push(&row.columns)?;
        let slot = self
            .inner
            .push(row.rid, row.indirection, row.schema, row.timestamp, &row.columns);
        self.base_rid.push(row.base_rid);
        Ok(slot)
    }

    pub fn row(&self, slot: usize) -> Option<TailRow> {
        if slot >= self.len() {
            return None;
        }
        Some(TailRow {
            rid: self.inner.rid[slot],
            indirection: self.inner.indirection[slot],
            schema: self.inner.schema[slot],
            timestamp: self.inner.timestamp[slot],
            base_rid: self.base_rid[slot],
            columns: self.inner.values(slot),
        })
    }

    pub fn value(&self, column: usize, slot: usize) -> Option<Value> {
        self.inner.columns.get(column)?.get(slot).copied()
    }

    pub fn column(&self, column: usize) -> &[Value] {
        &self.inner.columns[column]
    }

    pub fn rids(&self) -> &[Rid] {
        &self.inner.rid
    }

    pub fn indirections(&self) -> &[Rid] {
        &self.inner.indirection
    }

    pub fn schemas(&self) -> &[SchemaEncoding] {
        &self.inner.schema
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.inner.timestamp
    }

    pub fn base_rids(&self) -> &[Rid] {
        &self.base_rid
    }
}
