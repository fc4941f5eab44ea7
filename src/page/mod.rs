//! Page Store Module
//!
//! Physical columnar layout of a table.
//!
//! ## Responsibilities
//! - Fixed-capacity base and tail pages stored as parallel column arrays
//! - Page ranges: up to `pages_per_range` base pages sharing one tail list
//! - RID allocation (base RIDs ascend from 1, tail RIDs descend from -1)
//! - Indirection resolution over the tail pages of a range
//!
//! ## Layout
//! ```text
//! PageStore
//!  ├── PageRange 0
//!  │     ├── base pages [0..pages_per_range)   user cols | RID | Indirection | Schema | Timestamp
//!  │     └── tail pages [0..)                  user cols | RID | Indirection | Schema | Timestamp | BaseID
//!  ├── PageRange 1
//!  └── ...
//! ```

mod pages;
mod range;
mod store;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{LStoreError, Result};

pub use pages::{BasePage, BaseRow, TailPage, TailRow};
pub use range::PageRange;
pub use store::{PageStore, TailWrite};

/// Record identifier: positive for base records, negative for tail records
pub type Rid = i64;

/// A column value (all columns are integers)
pub type Value = i64;

/// Widest table the schema bitmap can describe
pub const MAX_COLUMNS: usize = 64;

/// Number of metadata columns on a base page (RID, Indirection, Schema, Timestamp)
pub const BASE_META_COLUMNS: usize = 4;

/// Number of metadata columns on a tail page (base metadata + BaseID)
pub const TAIL_META_COLUMNS: usize = 5;

/// Unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Page Kind
// =============================================================================

/// Which page list a page belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKind {
    Base,
    Tail,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Base => write!(f, "Base"),
            PageKind::Tail => write!(f, "Tail"),
        }
    }
}

/// Physical position of a record inside the page store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageLocation {
    pub range: usize,
    pub page: usize,
    pub slot: usize,
}

// =============================================================================
// Schema Encoding
// =============================================================================

/// Bitmap of the user columns a version changed (bit i = column i)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaEncoding {
    bits: u64,
    width: u8,
}

impl SchemaEncoding {
    /// All-unset encoding for a table of `width` columns
    pub fn empty(width: usize) -> Self {
        debug_assert!(width <= MAX_COLUMNS);
        Self {
            bits: 0,
            width: width as u8,
        }
    }

    /// Bit i set iff `update[i]` is `Some`
    pub fn from_update(update: &[Option<Value>]) -> Self {
        let mut encoding = Self::empty(update.len());
        for (i, value) in update.iter().enumerate() {
            if value.is_some() {
                encoding.set(i);
            }
        }
        encoding
    }

    pub fn set(&mut self, column: usize) {
        if column < self.width as usize {
            self.bits |= 1 << column;
        }
    }

    pub fn is_set(&self, column: usize) -> bool {
        column < self.width as usize && self.bits & (1 << column) != 0
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Indices of the set columns, ascending
    pub fn changed_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width()).filter(move |&c| self.is_set(c))
    }
}

/// Renders column 0 first: a change to column 2 of 5 is `00100`
impl fmt::Display for SchemaEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for column in 0..self.width() {
            f.write_str(if self.is_set(column) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for SchemaEncoding {
    type Err = LStoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > MAX_COLUMNS {
            return Err(LStoreError::Corruption(format!(
                "schema encoding wider than {} columns: {}",
                MAX_COLUMNS,
                s.len()
            )));
        }
        let mut encoding = Self::empty(s.len());
        for (column, c) in s.chars().enumerate() {
            match c {
                '1' => encoding.set(column),
                '0' => {}
                other => {
                    return Err(LStoreError::Corruption(format!(
                        "invalid schema encoding character {:?}",
                        other
                    )))
                }
            }
        }
        Ok(encoding)
    }
}
