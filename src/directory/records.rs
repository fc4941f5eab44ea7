//! Record directory implementation

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::page::{Rid, Value};

use super::Record;

/// RID → Record map shared by readers and writers
#[derive(Debug, Default)]
pub struct RecordDirectory {
    records: RwLock<BTreeMap<Rid, Record>>,
}

impl RecordDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record at `record.rid`
    pub fn insert(&self, record: Record) -> Option<Record> {
        self.records.write().insert(record.rid, record)
    }

    /// A copy of the record at `rid`
    pub fn get(&self, rid: Rid) -> Option<Record> {
        self.records.read().get(&rid).cloned()
    }

    /// Replace the columns of an existing record
    pub fn update_columns(&self, rid: Rid, columns: Vec<Value>) -> bool {
        let mut records = self.records.write();
        match records.get_mut(&rid) {
            Some(record) => {
                record.columns = columns;
                true
            }
            None => false,
        }
    }

    /// Remove and return the record, marked invalid
    pub fn remove(&self, rid: Rid) -> Option<Record> {
        self.records.write().remove(&rid).map(|mut record| {
            record.invalidate();
            record
        })
    }

    pub fn contains(&self, rid: Rid) -> bool {
        self.records.read().contains_key(&rid)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// RIDs whose `column` equals `value` (full scan)
    pub fn scan(&self, column: usize, value: Value) -> Vec<Rid> {
        self.records
            .read()
            .values()
            .filter(|r| r.columns.get(column) == Some(&value))
            .map(|r| r.rid)
            .collect()
    }

    /// RIDs whose `column` lies in `[begin, end]` (full scan)
    pub fn scan_range(&self, column: usize, begin: Value, end: Value) -> Vec<Rid> {
        self.records
            .read()
            .values()
            .filter(|r| matches!(r.columns.get(column), Some(v) if (begin..=end).contains(v)))
            .map(|r| r.rid)
            .collect()
    }

    /// (value, rid) pairs of one column, in RID order
    pub fn column_entries(&self, column: usize) -> Vec<(Value, Rid)> {
        self.records
            .read()
            .values()
            .filter_map(|r| r.columns.get(column).map(|v| (*v, r.rid)))
            .collect()
    }

    /// Copy of every record in RID order
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.read().values().cloned().collect()
    }
}
