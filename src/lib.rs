//! # LStore
//!
//! A columnar storage engine in the L-Store style:
//! - Records are never updated in place; updates append tail versions
//! - A merge pass lazily folds tail versions back into base pages
//! - Per-column hash indexes and a RID-keyed record directory
//! - A buffer pool bounding unflushed pages, with pluggable eviction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Database (session)                          │
//! │             Query facade / lstore-cli                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Table                                   │
//! │     LockTable · Index · RecordDirectory · MergeEngine        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  PageStore  │◀─────────│ BufferPool  │
//!   │  (RwLock)   │          │ (Replacer)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │ write-back
//!          ▼                        ▼
//!                 ┌─────────────┐
//!                 │   Storage   │
//!                 │ (TableFiles)│
//!                 └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod page;
pub mod index;
pub mod directory;
pub mod lock;
pub mod buffer;
pub mod storage;
pub mod merge;
pub mod table;
pub mod database;
pub mod query;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LStoreError, Result};
pub use config::{Config, EvictionPolicy, MergeMode};
pub use database::Database;
pub use directory::{ProjectedRecord, Record};
pub use merge::MergeReport;
pub use page::{Rid, SchemaEncoding, Value};
pub use query::Query;
pub use table::Table;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of LStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
