//! Merge Module
//!
//! Lazily folds tail deltas back into base pages.
//!
//! ## Responsibilities
//! - Walk tail records in order from the persisted TPS cursor
//! - Apply each delta's changed columns to a private copy of the base pages
//! - Install the merged columns and advance TPS at the end of the pass
//! - Run inline on the writer that crosses the threshold, or on a worker
//!
//! ```text
//!   Table ──record_tail_write──▶ MergeEngine ◀──Run── MergeWorker
//!                                    │
//!            working copy ◀─clone─── PageStore ◀─install (write lock)
//! ```
//!
//! Compaction never touches the Record Directory or the Index; `select`
//! reads the Directory, which foreground writes keep current.

mod checkpoint;
mod engine;
mod worker;

pub use checkpoint::MergeCheckpoint;
pub use engine::{MergeEngine, MergeReport};
pub use worker::{MergeSignal, MergeWorker};
