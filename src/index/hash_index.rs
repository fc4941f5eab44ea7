//! Hash index implementation

use std::collections::HashMap;

use crate::page::{Rid, Value};

/// Index of a single column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnIndex {
    buckets: HashMap<Value, Vec<Rid>>,
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Value, rid: Rid) {
        self.buckets.entry(value).or_default().push(rid);
    }

    /// Removes `rid` from the bucket of `value`; absent pairs are ignored
    pub fn remove(&mut self, value: Value, rid: Rid) -> bool {
        let Some(bucket) = self.buckets.get_mut(&value) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|&r| r == rid) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&value);
        }
        true
    }

    pub fn get(&self, value: Value) -> &[Rid] {
        self.buckets.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Buckets in ascending value order
    pub fn sorted_buckets(&self) -> Vec<(Value, &[Rid])> {
        let mut buckets: Vec<_> = self
            .buckets
            .iter()
            .map(|(value, rids)| (*value, rids.as_slice()))
            .collect();
        buckets.sort_unstable_by_key(|(value, _)| *value);
        buckets
    }

    /// Replace a whole bucket (used when decoding)
    pub fn insert_bucket(&mut self, value: Value, rids: Vec<Rid>) {
        if !rids.is_empty() {
            self.buckets.insert(value, rids);
        }
    }
}

/// Per-column indexes of one table; `None` marks a column without an index
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    columns: Vec<Option<ColumnIndex>>,
}

impl Index {
    /// Every column starts indexed
    pub fn new(num_columns: usize) -> Self {
        Self {
            columns: (0..num_columns).map(|_| Some(ColumnIndex::new())).collect(),
        }
    }

    /// Build from already-decoded columns
    pub fn from_columns(columns: Vec<Option<ColumnIndex>>) -> Self {
        Self { columns }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        matches!(self.columns.get(column), Some(Some(_)))
    }

    pub fn column(&self, column: usize) -> Option<&ColumnIndex> {
        self.columns.get(column)?.as_ref()
    }

    /// Append `rid` to the bucket for `value`; unindexed columns are skipped
    pub fn add(&mut self, column: usize, value: Value, rid: Rid) {
        if let Some(Some(index)) = self.columns.get_mut(column) {
            index.add(value, rid);
        }
    }

    /// Remove `rid` from the bucket for `value`. A missing pair is a no-op.
    pub fn remove(&mut self, column: usize, value: Value, rid: Rid) {
        if let Some(Some(index)) = self.columns.get_mut(column) {
            index.remove(value, rid);
        }
    }

    /// Index every column of a record
    pub fn add_record(&mut self, rid: Rid, columns: &[Value]) {
        for (column, value) in columns.iter().enumerate() {
            self.add(column, *value, rid);
        }
    }

    /// Remove every column of a record
    pub fn remove_record(&mut self, rid: Rid, columns: &[Value]) {
        for (column, value) in columns.iter().enumerate() {
            self.remove(column, *value, rid);
        }
    }

    /// RIDs whose `column` equals `value`, in insertion order
    pub fn locate(&self, column: usize, value: Value) -> Vec<Rid> {
        self.column(column)
            .map(|index| index.get(value).to_vec())
            .unwrap_or_default()
    }

    /// RIDs whose `column` lies in `[begin, end]`.
    ///
    /// Probes every integer in the interval as a bucket key, so cost is the
    /// width of the interval rather than the number of matches. Only sensible
    /// on densely populated integer columns such as the primary key.
    pub fn locate_range(&self, column: usize, begin: Value, end: Value) -> Vec<Rid> {
        let Some(index) = self.column(column) else {
            return Vec::new();
        };
        if begin > end {
            return Vec::new();
        }
        let mut rids = Vec::new();
        for value in begin..=end {
            rids.extend_from_slice(index.get(value));
        }
        rids
    }

    /// Start indexing `column` with the given (value, rid) pairs
    pub fn create_index<I>(&mut self, column: usize, entries: I)
    where
        I: IntoIterator<Item = (Value, Rid)>,
    {
        if column >= self.columns.len() {
            return;
        }
        let mut index = ColumnIndex::new();
        for (value, rid) in entries {
            index.add(value, rid);
        }
        self.columns[column] = Some(index);
    }

    /// Stop indexing `column`
    pub fn drop_index(&mut self, column: usize) {
        if let Some(slot) = self.columns.get_mut(column) {
            *slot = None;
        }
    }

    pub(crate) fn columns(&self) -> &[Option<ColumnIndex>] {
        &self.columns
    }
}
