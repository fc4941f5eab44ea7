//! Binary and text encodings of persisted table state
//!
//! ## Numeric Values
//! ```text
//! 0 <= v < u32::MAX   [v: u32 LE]                       4 bytes
//! otherwise           [u32::MAX: u32 LE][v: i64 LE]     12 bytes
//! ```
//!
//! ## Numeric Column File
//! ```text
//! [SegLen: u32][values...]   one segment per page, (range, page) order
//! ```
//!
//! ## Text Column File
//! One line per page, values separated by `,`.
//!
//! ## Page Directory
//! ```text
//! [RecLen: u32][rid][key][col 0]..[col n-1][valid: u8]   repeated
//! ```
//!
//! ## Index
//! ```text
//! [BodyLen: u32][Columns: u32]
//!   per column: [Present: u8][Buckets: u32]
//!     per bucket: [Value: i64][Rids: u32][Rid: i64]...
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::directory::Record;
use crate::error::{LStoreError, Result};
use crate::index::{ColumnIndex, Index};
use crate::page::Value;

/// Marks an escaped 8-byte value in the numeric encoding
pub const VALUE_ESCAPE: u32 = u32::MAX;

/// Separator of text column values
pub const TEXT_DELIMITER: char = ',';

// =============================================================================
// Values
// =============================================================================

pub fn put_value(buf: &mut BytesMut, value: Value) {
    if (0..VALUE_ESCAPE as i64).contains(&value) {
        buf.put_u32_le(value as u32);
    } else {
        buf.put_u32_le(VALUE_ESCAPE);
        buf.put_i64_le(value);
    }
}

pub fn get_value(buf: &mut &[u8]) -> Result<Value> {
    let head = get_u32(buf, "value")?;
    if head != VALUE_ESCAPE {
        return Ok(head as Value);
    }
    if buf.remaining() < 8 {
        return Err(truncated("escaped value"));
    }
    Ok(buf.get_i64_le())
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(truncated(what));
    }
    Ok(buf.get_u32_le())
}

fn truncated(what: &str) -> LStoreError {
    LStoreError::Corruption(format!("truncated {}", what))
}

// =============================================================================
// Column Files
// =============================================================================

/// Append one page segment of a numeric column
pub fn put_segment(buf: &mut BytesMut, values: &[Value]) {
    let mut body = BytesMut::with_capacity(values.len() * 4);
    for value in values {
        put_value(&mut body, *value);
    }
    buf.put_u32_le(body.len() as u32);
    buf.extend_from_slice(&body);
}

/// Split a numeric column file into its page segments
pub fn decode_segments(mut bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
    let mut segments = Vec::new();
    while bytes.has_remaining() {
        let len = get_u32(&mut bytes, "segment length")? as usize;
        if bytes.remaining() < len {
            return Err(truncated("segment"));
        }
        let (mut body, rest) = bytes.split_at(len);
        let mut values = Vec::new();
        while body.has_remaining() {
            values.push(get_value(&mut body)?);
        }
        segments.push(values);
        bytes = rest;
    }
    Ok(segments)
}

/// One text line per page
pub fn encode_text_pages<T: ToString>(pages: &[Vec<T>]) -> String {
    let delimiter = TEXT_DELIMITER.to_string();
    pages
        .iter()
        .map(|items| {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(&delimiter)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inverse of `encode_text_pages`; an empty line is an empty page
pub fn decode_text_pages(text: &str) -> Vec<Vec<String>> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                Vec::new()
            } else {
                line.split(TEXT_DELIMITER).map(str::to_string).collect()
            }
        })
        .collect()
}

// =============================================================================
// Page Directory
// =============================================================================

pub fn encode_record(record: &Record) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 * (record.columns.len() + 2) + 1);
    put_value(&mut buf, record.rid);
    put_value(&mut buf, record.key);
    for value in &record.columns {
        put_value(&mut buf, *value);
    }
    buf.put_u8(record.valid as u8);
    buf
}

pub fn decode_record(mut bytes: &[u8], num_columns: usize) -> Result<Record> {
    let rid = get_value(&mut bytes)?;
    let key = get_value(&mut bytes)?;
    let mut columns = Vec::with_capacity(num_columns);
    for _ in 0..num_columns {
        columns.push(get_value(&mut bytes)?);
    }
    if bytes.remaining() != 1 {
        return Err(LStoreError::Corruption(format!(
            "record {} has {} trailing bytes, expected a validity flag",
            rid,
            bytes.remaining()
        )));
    }
    let valid = bytes.get_u8() != 0;
    Ok(Record {
        rid,
        key,
        columns,
        valid,
    })
}

pub fn encode_directory<'a, I>(records: I) -> BytesMut
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buf = BytesMut::new();
    for record in records {
        let body = encode_record(record);
        buf.put_u32_le(body.len() as u32);
        buf.extend_from_slice(&body);
    }
    buf
}

pub fn decode_directory(mut bytes: &[u8], num_columns: usize) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while bytes.has_remaining() {
        let len = get_u32(&mut bytes, "record length")? as usize;
        if bytes.remaining() < len {
            return Err(truncated("record"));
        }
        let (body, rest) = bytes.split_at(len);
        records.push(decode_record(body, num_columns)?);
        bytes = rest;
    }
    Ok(records)
}

// =============================================================================
// Index
// =============================================================================

pub fn encode_index(index: &Index) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_u32_le(index.num_columns() as u32);
    for column in index.columns() {
        match column {
            None => {
                body.put_u8(0);
                body.put_u32_le(0);
            }
            Some(column) => {
                body.put_u8(1);
                body.put_u32_le(column.bucket_count() as u32);
                for (value, rids) in column.sorted_buckets() {
                    body.put_i64_le(value);
                    body.put_u32_le(rids.len() as u32);
                    for rid in rids {
                        body.put_i64_le(*rid);
                    }
                }
            }
        }
    }

    let mut buf = BytesMut::with_capacity(body.len() + 4);
    buf.put_u32_le(body.len() as u32);
    buf.extend_from_slice(&body);
    buf
}

pub fn decode_index(mut bytes: &[u8]) -> Result<Index> {
    let len = get_u32(&mut bytes, "index length")? as usize;
    if bytes.remaining() < len {
        return Err(truncated("index"));
    }
    let mut body = &bytes[..len];

    let num_columns = get_u32(&mut body, "index column count")? as usize;
    let mut columns = Vec::with_capacity(num_columns);
    for _ in 0..num_columns {
        if !body.has_remaining() {
            return Err(truncated("index column"));
        }
        let present = body.get_u8() != 0;
        let buckets = get_u32(&mut body, "bucket count")?;
        if !present {
            columns.push(None);
            continue;
        }
        let mut column = ColumnIndex::new();
        for _ in 0..buckets {
            if body.remaining() < 12 {
                return Err(truncated("index bucket"));
            }
            let value = body.get_i64_le();
            let count = body.get_u32_le() as usize;
            if body.remaining() < count * 8 {
                return Err(truncated("index bucket rids"));
            }
            let rids = (0..count).map(|_| body.get_i64_le()).collect();
            column.insert_bucket(value, rids);
        }
        columns.push(Some(column));
    }
    Ok(Index::from_columns(columns))
}
