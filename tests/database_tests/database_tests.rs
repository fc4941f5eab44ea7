//! Tests for Database
//!
//! These tests verify:
//! - Table lifecycle (create / get / drop / close)
//! - Persistence round trip of directory, index, pages and merge cursor
//! - Write-back of evicted pages with a tiny buffer pool
//! - Recovery from a corrupt merge checkpoint

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use lstore::config::{Config, EvictionPolicy};
use lstore::storage::TableFiles;
use lstore::{Database, LStoreError, Table};

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .page_capacity(4)
        .pages_per_range(2)
        .merge_threshold(0)
        .bufferpool_size(2)
        .eviction_seed(5)
        .build()
}

fn open(dir: &Path) -> Database {
    Database::open(small_config(dir)).unwrap()
}

fn all_columns(table: &Table, key: i64) -> Vec<i64> {
    let mask = vec![1u8; table.num_columns()];
    table.select(key, table.key_index(), &mask).unwrap()[0]
        .columns
        .iter()
        .map(|c| c.unwrap())
        .collect()
}

/// 30 records over 4 page ranges, updates spread across all of them
fn populate(table: &Table) {
    for key in 0..30 {
        table.insert(&[key, key % 4, key * key]).unwrap();
    }
    for key in (0..30).step_by(3) {
        table.update(key, &[None, Some(100 + key), None]).unwrap();
    }
    for key in (0..30).step_by(5) {
        table.update(key, &[None, None, Some(-key)]).unwrap();
    }
    table.delete(7).unwrap();
    table.delete(8).unwrap();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _db = Database::open(Config::builder().data_dir(&data_dir).build()).unwrap();
    assert!(data_dir.exists());
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .page_capacity(0)
        .build();

    assert!(matches!(Database::open(config), Err(LStoreError::Config(_))));
}

#[test]
fn test_create_table_writes_table_info() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());
    db.create_table("grades", 5, 1).unwrap();

    let text = fs::read_to_string(temp_dir.path().join("grades").join(TableFiles::TABLE_INFO)).unwrap();
    assert_eq!(text, "grades,5,1");
    assert_eq!(db.table_names(), vec!["grades".to_string()]);
}

#[test]
fn test_create_table_twice_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());
    db.create_table("grades", 5, 0).unwrap();

    assert!(matches!(
        db.create_table("grades", 5, 0),
        Err(LStoreError::TableExists(_))
    ));
}

#[test]
fn test_create_table_validates_shape_and_name() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());

    assert!(db.create_table("t", 0, 0).is_err());
    assert!(db.create_table("t", 65, 0).is_err());
    assert!(db.create_table("t", 3, 3).is_err());
    assert!(db.create_table("../escape", 3, 0).is_err());
    assert!(db.create_table("", 3, 0).is_err());
    assert!(db.table_names().is_empty());
}

#[test]
fn test_get_missing_table() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());

    assert!(matches!(db.get_table("nope"), Err(LStoreError::NoSuchTable(_))));
}

#[test]
fn test_get_table_returns_live_handle() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());
    let created = db.create_table("t", 3, 0).unwrap();
    created.insert(&[1, 2, 3]).unwrap();

    let fetched = db.get_table("t").unwrap();
    assert_eq!(fetched.record_count(), 1);
    assert_eq!(fetched.id(), created.id());
}

#[test]
fn test_drop_table_removes_directory() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());
    db.create_table("t", 3, 0).unwrap();

    db.drop_table("t").unwrap();
    assert!(!temp_dir.path().join("t").exists());
    assert!(db.table_names().is_empty());
    assert!(matches!(db.drop_table("t"), Err(LStoreError::NoSuchTable(_))));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_round_trip_preserves_directory_and_index() {
    let temp_dir = TempDir::new().unwrap();
    let mut expected = Vec::new();
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        populate(&table);
        for key in (0..30).filter(|k| *k != 7 && *k != 8) {
            expected.push((key, all_columns(&table, key), table.locate(0, key).unwrap()));
        }
        db.close().unwrap();
    }

    let db = open(temp_dir.path());
    let table = db.get_table("t").unwrap();
    assert_eq!(table.record_count(), 28);
    for (key, columns, rids) in expected {
        assert_eq!(all_columns(&table, key), columns);
        assert_eq!(table.locate(0, key).unwrap(), rids);
    }
    assert!(table.locate(0, 7).unwrap().is_empty());
    assert_eq!(table.locate(1, 103).unwrap(), table.locate(0, 3).unwrap());
}

#[test]
fn test_round_trip_preserves_pages() {
    let temp_dir = TempDir::new().unwrap();
    let (base_rows, tail_rows, ranges, pages, tails);
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        populate(&table);
        base_rows = (1..=30)
            .map(|rid| (table.read_base_slot(rid), table.read_base_indirection(rid)))
            .collect::<Vec<_>>();
        tails = table.tail_record_count();
        tail_rows = (1..=tails as i64)
            .map(|n| table.read_tail_row(-n))
            .collect::<Vec<_>>();
        ranges = table.page_range_count();
        pages = table.base_page_count();
        db.close().unwrap();
    }

    let db = open(temp_dir.path());
    let table = db.get_table("t").unwrap();
    assert_eq!(table.page_range_count(), ranges);
    assert_eq!(table.base_page_count(), pages);
    assert_eq!(table.tail_record_count(), tails);
    for (rid, row) in (1..=30).zip(&base_rows) {
        assert_eq!(&(table.read_base_slot(rid), table.read_base_indirection(rid)), row);
    }
    for (n, row) in (1..=tails as i64).zip(&tail_rows) {
        assert!(row.is_some());
        assert_eq!(&table.read_tail_row(-n), row);
    }

    // New RIDs continue after the restored ones
    assert_eq!(table.insert(&[500, 0, 0]).unwrap(), 31);
    let next_tail = table.update(500, &[None, Some(1), None]).unwrap();
    assert_eq!(next_tail, -(tails as i64) - 1);
}

#[test]
fn test_updates_after_reopen_extend_version_chain() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        table.insert(&[1, 2, 3]).unwrap();
        table.update(1, &[None, Some(20), None]).unwrap();
        db.close().unwrap();
    }

    let db = open(temp_dir.path());
    let table = db.get_table("t").unwrap();
    let rid = table.update(1, &[None, None, Some(30)]).unwrap();

    assert_eq!(rid, -2);
    assert_eq!(table.read_tail_row(rid).unwrap().indirection, -1);
    assert_eq!(all_columns(&table, 1), vec![1, 20, 30]);
}

#[test]
fn test_evicted_pages_are_written_back() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(temp_dir.path());
    let table = db.create_table("t", 3, 0).unwrap();
    // Far more pages than the pool holds
    for key in 0..40 {
        table.insert(&[key, 0, 0]).unwrap();
    }

    assert!(table.pool().len() <= 2);
    assert!(temp_dir.path().join("t").join("BaseColumn_1").exists());
}

#[test]
fn test_merge_cursor_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        for key in 0..3 {
            table.insert(&[key, 0, 0]).unwrap();
        }
        for key in 0..3 {
            table.update(key, &[None, Some(key + 10), None]).unwrap();
        }
        assert_eq!(table.merge().unwrap().tps, 3);
        db.close().unwrap();
    }

    let db = open(temp_dir.path());
    let table = db.get_table("t").unwrap();
    assert_eq!(table.tps(), 3);
    assert_eq!(table.read_base_slot(2).unwrap(), vec![1, 11, 0]);
    assert_eq!(table.merge().unwrap().processed, 0);
}

#[test]
fn test_corrupt_checkpoint_restarts_cursor() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        table.insert(&[1, 0, 0]).unwrap();
        table.update(1, &[None, Some(5), None]).unwrap();
        table.merge().unwrap();
        db.close().unwrap();
    }
    let state = temp_dir.path().join("t").join(TableFiles::MERGE_STATE);
    let mut bytes = fs::read(&state).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&state, bytes).unwrap();

    let db = open(temp_dir.path());
    let table = db.get_table("t").unwrap();
    assert_eq!(table.tps(), 0);
    assert_eq!(all_columns(&table, 1), vec![1, 5, 0]);
}

#[test]
fn test_corrupt_column_file_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    {
        let db = open(temp_dir.path());
        let table = db.create_table("t", 3, 0).unwrap();
        table.insert(&[1, 0, 0]).unwrap();
        db.close().unwrap();
    }
    fs::write(temp_dir.path().join("t").join("BaseColumn_2"), [1u8, 0]).unwrap();

    let db = open(temp_dir.path());
    assert!(matches!(db.get_table("t"), Err(LStoreError::Corruption(_))));
}

#[test]
fn test_lru_policy_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .eviction_policy(EvictionPolicy::Lru)
        .bufferpool_size(1)
        .build();
    {
        let db = Database::open(config.clone()).unwrap();
        let table = db.create_table("t", 2, 1).unwrap();
        table.insert(&[9, 1]).unwrap();
        table.update(1, &[Some(8), None]).unwrap();
        db.close().unwrap();
    }

    let db = Database::open(config).unwrap();
    let table = db.get_table("t").unwrap();
    assert_eq!(all_columns(&table, 1), vec![8, 1]);
}
