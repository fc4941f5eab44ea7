//! Index Module
//!
//! Secondary index: per column, a hash map from value to the RIDs holding it.
//!
//! ## Responsibilities
//! - Point lookup (`locate`) and integer range lookup (`locate_range`)
//! - Insertion and best-effort removal of (value, RID) pairs
//! - Per-column enable/disable (`create_index` / `drop_index`)
//!
//! Buckets keep insertion order and may hold several RIDs for one value.

mod hash_index;

pub use hash_index::{ColumnIndex, Index};
