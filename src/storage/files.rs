//! Table files
//!
//! Reads and writes every persisted file of one table directory and serves
//! as the buffer pool's write-back target for dirty pages.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::buffer::{PageId, WriteBack};
use crate::directory::Record;
use crate::error::{LStoreError, Result};
use crate::index::Index;
use crate::merge::MergeCheckpoint;
use crate::page::{
    BaseRow, PageKind, PageStore, SchemaEncoding, TailRow, Value, BASE_META_COLUMNS,
    TAIL_META_COLUMNS,
};

use super::codec;

/// Shape of a table as recorded in `table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub num_columns: usize,
    pub key_index: usize,
}

impl TableInfo {
    /// `name,num_columns,key_index`
    pub fn encode(&self) -> String {
        format!("{},{},{}", self.name, self.num_columns, self.key_index)
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut parts = text.trim().rsplitn(3, ',');
        let key_index = parts.next();
        let num_columns = parts.next();
        let name = parts.next();
        match (name, num_columns, key_index) {
            (Some(name), Some(num_columns), Some(key_index)) => Ok(Self {
                name: name.to_string(),
                num_columns: parse_field(num_columns, "num_columns")?,
                key_index: parse_field(key_index, "key_index")?,
            }),
            _ => Err(LStoreError::Corruption(format!(
                "table_info must be name,num_columns,key_index: {:?}",
                text
            ))),
        }
    }
}

fn parse_field<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| LStoreError::Corruption(format!("invalid {}: {:?}", what, text)))
}

/// The persisted file set of one table
///
/// Column files are rewritten whole, one page list at a time, under a
/// writer mutex so concurrent write-backs never interleave.
pub struct TableFiles {
    dir: PathBuf,
    table: u32,
    store: Arc<RwLock<PageStore>>,
    write_lock: Mutex<()>,
}

impl TableFiles {
    // =========================================================================
    // File Names
    // =========================================================================
    pub const TABLE_INFO: &'static str = "table_info";
    pub const PAGE_DIRECTORY: &'static str = "page_directory";
    pub const INDEX: &'static str = "index";
    pub const MERGE_STATE: &'static str = "merge_state";

    pub fn new(dir: impl Into<PathBuf>, table: u32, store: Arc<RwLock<PageStore>>) -> Self {
        Self {
            dir: dir.into(),
            table,
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `BaseColumn_<n>` / `TailColumn_<n>`, numbered from 1
    pub fn column_path(&self, kind: PageKind, column: usize) -> PathBuf {
        self.dir.join(format!("{}Column_{}", kind, column))
    }

    // =========================================================================
    // Table Info
    // =========================================================================

    pub fn write_table_info(&self, info: &TableInfo) -> Result<()> {
        write_atomic(&self.dir.join(Self::TABLE_INFO), info.encode().as_bytes())
    }

    pub fn read_table_info(dir: &Path) -> Result<TableInfo> {
        let text = fs::read_to_string(dir.join(Self::TABLE_INFO))?;
        TableInfo::decode(&text)
    }

    // =========================================================================
    // Page Directory & Index
    // =========================================================================

    pub fn write_directory(&self, records: &[Record]) -> Result<()> {
        let bytes = codec::encode_directory(records);
        write_atomic(&self.dir.join(Self::PAGE_DIRECTORY), &bytes)
    }

    pub fn read_directory(&self, num_columns: usize) -> Result<Vec<Record>> {
        match read_optional(&self.dir.join(Self::PAGE_DIRECTORY))? {
            Some(bytes) => codec::decode_directory(&bytes, num_columns),
            None => Ok(Vec::new()),
        }
    }

    pub fn write_index(&self, index: &Index) -> Result<()> {
        let bytes = codec::encode_index(index);
        write_atomic(&self.dir.join(Self::INDEX), &bytes)
    }

    /// None when no index was ever written
    pub fn read_index(&self) -> Result<Option<Index>> {
        read_optional(&self.dir.join(Self::INDEX))?
            .map(|bytes| codec::decode_index(&bytes))
            .transpose()
    }

    // =========================================================================
    // Merge Checkpoint
    // =========================================================================

    pub fn write_checkpoint(&self, checkpoint: &MergeCheckpoint) -> Result<()> {
        write_atomic(&self.dir.join(Self::MERGE_STATE), &checkpoint.encode()?)
    }

    pub fn read_checkpoint(&self) -> Result<Option<MergeCheckpoint>> {
        read_optional(&self.dir.join(Self::MERGE_STATE))?
            .map(|bytes| MergeCheckpoint::decode(&bytes))
            .transpose()
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Rewrite every column file of one page list from the live store
    pub fn write_pages(&self, kind: PageKind) -> Result<()> {
        let _writer = self.write_lock.lock();
        let files = {
            let store = self.store.read();
            match kind {
                PageKind::Base => encode_base_columns(&store),
                PageKind::Tail => encode_tail_columns(&store),
            }
        };
        for (column, bytes) in files.iter().enumerate() {
            write_atomic(&self.column_path(kind, column + 1), bytes)?;
        }
        debug!(table = self.table, %kind, files = files.len(), "wrote page columns");
        Ok(())
    }

    /// Base rows in file order; empty if the table never wrote base pages
    pub fn read_base_rows(&self, num_columns: usize) -> Result<Vec<BaseRow>> {
        let Some(columns) = self.read_columns(PageKind::Base, num_columns)? else {
            return Ok(Vec::new());
        };
        let meta = num_columns;
        let rows = (0..columns.numeric[0].len())
            .map(|i| {
                Ok(BaseRow {
                    rid: columns.numeric[meta][i],
                    indirection: columns.numeric[meta + 1][i],
                    schema: columns.schema[i].parse()?,
                    timestamp: parse_field(&columns.timestamp[i], "timestamp")?,
                    columns: columns.numeric[..num_columns].iter().map(|c| c[i]).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tail rows in allocation order (-1, -2, ...); empty if the table never
    /// wrote tail pages
    pub fn read_tail_rows(&self, num_columns: usize) -> Result<Vec<TailRow>> {
        let Some(columns) = self.read_columns(PageKind::Tail, num_columns)? else {
            return Ok(Vec::new());
        };
        let meta = num_columns;
        let rows = (0..columns.numeric[0].len())
            .map(|i| {
                Ok(TailRow {
                    rid: columns.numeric[meta][i],
                    indirection: columns.numeric[meta + 1][i],
                    schema: columns.schema[i].parse()?,
                    timestamp: parse_field(&columns.timestamp[i], "timestamp")?,
                    base_rid: columns.numeric[meta + 2][i],
                    columns: columns.numeric[..num_columns].iter().map(|c| c[i]).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        // files are range-major, RIDs are global
        let mut rows = rows;
        rows.sort_by_key(|row| std::cmp::Reverse(row.rid));
        Ok(rows)
    }

    /// Read and flatten the column files of one page list.
    ///
    /// Numeric columns come back as user columns, then RID, Indirection and
    /// (tail only) BaseID.
    fn read_columns(&self, kind: PageKind, num_columns: usize) -> Result<Option<DecodedColumns>> {
        let layout = ColumnLayout::new(kind, num_columns);
        let mut numeric = Vec::new();
        let mut schema = Vec::new();
        let mut timestamp = Vec::new();

        for column in 1..=layout.total {
            let path = self.column_path(kind, column);
            let Some(bytes) = read_optional(&path)? else {
                if column == 1 {
                    return Ok(None);
                }
                return Err(LStoreError::Corruption(format!(
                    "missing column file {}",
                    path.display()
                )));
            };
            if column == layout.schema {
                schema = flatten_text(&bytes)?;
            } else if column == layout.timestamp {
                timestamp = flatten_text(&bytes)?;
            } else {
                numeric.push(codec::decode_segments(&bytes)?.concat());
            }
        }

        let rows = numeric[0].len();
        if numeric.iter().any(|c| c.len() != rows) || schema.len() != rows || timestamp.len() != rows {
            return Err(LStoreError::Corruption(format!(
                "{} column files disagree on record count",
                kind
            )));
        }
        Ok(Some(DecodedColumns {
            numeric,
            schema,
            timestamp,
        }))
    }
}

impl WriteBack for TableFiles {
    fn write_back(&self, pages: &[PageId]) -> Result<()> {
        let kinds: BTreeSet<PageKind> = pages
            .iter()
            .filter(|p| p.table == self.table)
            .map(|p| p.kind)
            .collect();
        for kind in kinds {
            self.write_pages(kind)?;
        }
        Ok(())
    }
}

// =============================================================================
// Column Layout
// =============================================================================

/// 1-based file numbers of the columns of one page list
struct ColumnLayout {
    total: usize,
    schema: usize,
    timestamp: usize,
}

impl ColumnLayout {
    fn new(kind: PageKind, num_columns: usize) -> Self {
        let meta = match kind {
            PageKind::Base => BASE_META_COLUMNS,
            PageKind::Tail => TAIL_META_COLUMNS,
        };
        // user columns, RID, Indirection, Schema, Timestamp[, BaseID]
        Self {
            total: num_columns + meta,
            schema: num_columns + 3,
            timestamp: num_columns + 4,
        }
    }
}

struct DecodedColumns {
    numeric: Vec<Vec<Value>>,
    schema: Vec<String>,
    timestamp: Vec<String>,
}

fn flatten_text(bytes: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LStoreError::Corruption(format!("text column is not UTF-8: {}", e)))?;
    Ok(codec::decode_text_pages(text).concat())
}

/// Per-page segments of one numeric column
fn numeric_file<'a, I>(pages: I) -> BytesMut
where
    I: Iterator<Item = &'a [Value]>,
{
    let mut buf = BytesMut::new();
    for values in pages {
        codec::put_segment(&mut buf, values);
    }
    buf
}

fn text_file<T: ToString + Clone>(pages: Vec<&[T]>) -> BytesMut {
    let pages: Vec<Vec<T>> = pages.into_iter().map(<[T]>::to_vec).collect();
    BytesMut::from(codec::encode_text_pages(&pages).as_bytes())
}

fn encode_base_columns(store: &PageStore) -> Vec<BytesMut> {
    let pages: Vec<_> = store.ranges().iter().flat_map(|r| r.base_pages()).collect();
    let mut files = Vec::with_capacity(store.num_columns() + BASE_META_COLUMNS);
    for column in 0..store.num_columns() {
        files.push(numeric_file(pages.iter().map(|p| p.column(column))));
    }
    files.push(numeric_file(pages.iter().map(|p| p.rids())));
    files.push(numeric_file(pages.iter().map(|p| p.indirections())));
    files.push(text_file::<SchemaEncoding>(pages.iter().map(|p| p.schemas()).collect()));
    files.push(text_file::<u64>(pages.iter().map(|p| p.timestamps()).collect()));
    files
}

fn encode_tail_columns(store: &PageStore) -> Vec<BytesMut> {
    let pages: Vec<_> = store.ranges().iter().flat_map(|r| r.tail_pages()).collect();
    let mut files = Vec::with_capacity(store.num_columns() + TAIL_META_COLUMNS);
    for column in 0..store.num_columns() {
        files.push(numeric_file(pages.iter().map(|p| p.column(column))));
    }
    files.push(numeric_file(pages.iter().map(|p| p.rids())));
    files.push(numeric_file(pages.iter().map(|p| p.indirections())));
    files.push(text_file::<SchemaEncoding>(pages.iter().map(|p| p.schemas()).collect()));
    files.push(text_file::<u64>(pages.iter().map(|p| p.timestamps()).collect()));
    files.push(numeric_file(pages.iter().map(|p| p.base_rids())));
    files
}

// =============================================================================
// File Helpers
// =============================================================================

/// Write to a sibling temp file, fsync, then rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
