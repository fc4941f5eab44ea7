//! Storage Module
//!
//! On-disk representation of a table: one directory per table holding one
//! file per column plus the table metadata.
//!
//! ## Responsibilities
//! - Encode and decode page columns, the page directory and the index
//! - Rewrite column files when the buffer pool writes dirty pages back
//! - Reload a table's full state when a session reopens it
//!
//! ## Table Directory
//! ```text
//! <data_dir>/<table>/
//!   table_info          name,num_columns,key_index
//!   page_directory      length-prefixed records
//!   index               per-column hash buckets
//!   merge_state         merge cursor checkpoint (bincode + CRC32)
//!   BaseColumn_1..N     user columns
//!   BaseColumn_N+1      RID
//!   BaseColumn_N+2      Indirection
//!   BaseColumn_N+3      Schema Encoding (text)
//!   BaseColumn_N+4      Timestamp (text)
//!   TailColumn_1..N+4   same layout as base
//!   TailColumn_N+5      BaseID
//! ```

pub mod codec;
mod files;

pub use files::{TableFiles, TableInfo};
