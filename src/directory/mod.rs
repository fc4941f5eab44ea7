//! Record Directory Module
//!
//! Logical view of a table: RID → latest materialized column values.
//!
//! ## Responsibilities
//! - Serve `select` without replaying version chains
//! - Kept current explicitly by insert, update and delete
//! - Ordered by RID so serialization is deterministic
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in a parking_lot RwLock:
//! - Many concurrent readers, exclusive writers
//! - Ordered iteration for persistence

mod records;

pub use records::RecordDirectory;

use crate::page::{Rid, Value};

/// A record as held by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub rid: Rid,
    pub key: Value,
    pub columns: Vec<Value>,
    pub valid: bool,
}

impl Record {
    pub fn new(rid: Rid, key: Value, columns: Vec<Value>) -> Self {
        Self {
            rid,
            key,
            columns,
            valid: true,
        }
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Keep the columns whose mask entry is non-zero
    pub fn project(&self, mask: &[u8]) -> ProjectedRecord {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, value)| match mask.get(i) {
                Some(&m) if m != 0 => Some(*value),
                _ => None,
            })
            .collect();
        ProjectedRecord {
            rid: self.rid,
            key: self.key,
            columns,
        }
    }
}

/// A record returned by `select`; unprojected columns are `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedRecord {
    pub rid: Rid,
    pub key: Value,
    pub columns: Vec<Option<Value>>,
}
