//! Buffer Pool Module
//!
//! Fixed-capacity residency cache of page identifiers with pin and dirty
//! tracking.
//!
//! ## Responsibilities
//! - Bound how many pages may hold unflushed changes at once
//! - Pick eviction victims through a pluggable `Replacer`
//! - Write dirty victims back through `WriteBack` before they leave
//! - Flush every dirty page at session close
//!
//! The page store keeps page contents in memory; the pool decides when
//! those contents have to reach their files.
//!
//! ```text
//!   Table ──access/mark_dirty──▶ BufferPool ──evict──▶ Replacer
//!                                    │
//!                                    └──write_back──▶ WriteBack (TableFiles)
//! ```

mod pool;
mod replacer;

use std::fmt;

use crate::error::Result;
use crate::page::PageKind;

pub use pool::BufferPool;
pub use replacer::{LruReplacer, RandomReplacer, Replacer};

/// Identity of one page: table, page range, page list and position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table: u32,
    pub range: usize,
    pub kind: PageKind,
    pub page: usize,
}

impl PageId {
    pub fn base(table: u32, range: usize, page: usize) -> Self {
        Self {
            table,
            range,
            kind: PageKind::Base,
            page,
        }
    }

    pub fn tail(table: u32, range: usize, page: usize) -> Self {
        Self {
            table,
            range,
            kind: PageKind::Tail,
            page,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.table, self.range, self.kind, self.page)
    }
}

/// Destination for dirty pages leaving the pool
pub trait WriteBack: Send + Sync {
    /// Persist the current contents of `pages`
    fn write_back(&self, pages: &[PageId]) -> Result<()>;
}
