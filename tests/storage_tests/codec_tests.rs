//! Tests for the persisted encodings
//!
//! These tests verify:
//! - Numeric values use 4 bytes when they fit, the escape form otherwise
//! - Column segments, text pages, directory records and the index decode
//!   to what was encoded
//! - Truncated input is reported as corruption

use bytes::BytesMut;

use lstore::directory::Record;
use lstore::index::Index;
use lstore::storage::codec;
use lstore::storage::TableInfo;
use lstore::LStoreError;

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_small_value_is_four_bytes() {
    let mut buf = BytesMut::new();
    codec::put_value(&mut buf, 7);
    assert_eq!(buf.len(), 4);
}

#[test]
fn test_negative_and_large_values_are_escaped() {
    for value in [-1, i64::MIN, u32::MAX as i64, i64::MAX] {
        let mut buf = BytesMut::new();
        codec::put_value(&mut buf, value);
        assert_eq!(buf.len(), 12, "value {}", value);

        let mut bytes: &[u8] = &buf;
        assert_eq!(codec::get_value(&mut bytes).unwrap(), value);
        assert!(bytes.is_empty());
    }
}

#[test]
fn test_truncated_escape_is_corruption() {
    let mut buf = BytesMut::new();
    codec::put_value(&mut buf, -5);
    let mut bytes: &[u8] = &buf[..8];

    assert!(matches!(
        codec::get_value(&mut bytes),
        Err(LStoreError::Corruption(_))
    ));
}

// =============================================================================
// Column Files
// =============================================================================

#[test]
fn test_segments_keep_page_boundaries() {
    let mut buf = BytesMut::new();
    codec::put_segment(&mut buf, &[1, -2, 3]);
    codec::put_segment(&mut buf, &[]);
    codec::put_segment(&mut buf, &[u32::MAX as i64]);

    let segments = codec::decode_segments(&buf).unwrap();
    assert_eq!(segments, vec![vec![1, -2, 3], vec![], vec![u32::MAX as i64]]);
}

#[test]
fn test_truncated_segment_is_corruption() {
    let mut buf = BytesMut::new();
    codec::put_segment(&mut buf, &[1, 2, 3]);

    assert!(codec::decode_segments(&buf[..buf.len() - 1]).is_err());
}

#[test]
fn test_text_pages() {
    let pages = vec![vec!["00100".to_string(), "00000".to_string()], vec![]];
    let text = codec::encode_text_pages(&pages);

    assert_eq!(text, "00100,00000\n");
    assert_eq!(codec::decode_text_pages(&text), pages);
    assert!(codec::decode_text_pages("").is_empty());
}

// =============================================================================
// Page Directory
// =============================================================================

#[test]
fn test_directory_records() {
    let mut deleted = Record::new(2, 20, vec![20, -1, 3]);
    deleted.invalidate();
    let records = vec![Record::new(1, 10, vec![10, 5, 6]), deleted];

    let bytes = codec::encode_directory(&records);
    let decoded = codec::decode_directory(&bytes, 3).unwrap();

    assert_eq!(decoded, records);
    assert!(!decoded[1].valid);
}

#[test]
fn test_directory_wrong_column_count_is_corruption() {
    let bytes = codec::encode_directory(&[Record::new(1, 10, vec![10, 5, 6])]);

    assert!(codec::decode_directory(&bytes, 2).is_err());
}

// =============================================================================
// Index
// =============================================================================

#[test]
fn test_index_preserves_buckets_and_dropped_columns() {
    let mut index = Index::new(3);
    index.add_record(1, &[10, 7, -3]);
    index.add_record(2, &[11, 7, 4]);
    index.drop_index(2);

    let bytes = codec::encode_index(&index);
    let decoded = codec::decode_index(&bytes).unwrap();

    assert_eq!(decoded, index);
    assert_eq!(decoded.locate(1, 7), vec![1, 2]);
    assert!(!decoded.is_indexed(2));
}

#[test]
fn test_truncated_index_is_corruption() {
    let mut index = Index::new(1);
    index.add(0, 1, 1);
    let bytes = codec::encode_index(&index);

    assert!(codec::decode_index(&bytes[..bytes.len() - 3]).is_err());
}

// =============================================================================
// Table Info
// =============================================================================

#[test]
fn test_table_info_text() {
    let info = TableInfo {
        name: "grades".to_string(),
        num_columns: 5,
        key_index: 0,
    };

    assert_eq!(info.encode(), "grades,5,0");
    assert_eq!(TableInfo::decode("grades,5,0\n").unwrap(), info);
    assert!(TableInfo::decode("grades,5").is_err());
    assert!(TableInfo::decode("grades,x,0").is_err());
}
