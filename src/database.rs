//! Database Module
//!
//! The session object that owns every table of one data directory.
//!
//! ## Responsibilities
//! - Create, reopen and drop tables under `data_dir`
//! - Hand out shared table handles
//! - Persist every table on close

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{LStoreError, Result};
use crate::storage::TableFiles;
use crate::table::Table;

/// An open LStore session
///
/// All state hangs off this value and the `Config` it was opened with;
/// two sessions on different directories never share anything.
pub struct Database {
    config: Config,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    next_table_id: AtomicU32,
}

impl Database {
    /// Open or create a database rooted at `config.data_dir`
    ///
    /// Tables on disk are reopened lazily by `get_table`.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        info!(data_dir = %config.data_dir.display(), "opened database");
        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(1),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Create a new table and register it
    pub fn create_table(&self, name: &str, num_columns: usize, key_index: usize) -> Result<Arc<Table>> {
        check_name(name)?;
        let mut tables = self.tables.write();
        let dir = self.table_dir(name);
        if tables.contains_key(name) || dir.join(TableFiles::TABLE_INFO).exists() {
            return Err(LStoreError::TableExists(name.to_string()));
        }

        let table = Arc::new(Table::create(
            self.allocate_id(),
            name,
            num_columns,
            key_index,
            &dir,
            &self.config,
        )?);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// The live table, or the table reopened from disk
    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.read().get(name) {
            return Ok(Arc::clone(table));
        }

        check_name(name)?;
        let mut tables = self.tables.write();
        // Another caller may have opened it meanwhile
        if let Some(table) = tables.get(name) {
            return Ok(Arc::clone(table));
        }
        let dir = self.table_dir(name);
        if !dir.join(TableFiles::TABLE_INFO).exists() {
            return Err(LStoreError::NoSuchTable(name.to_string()));
        }
        let table = Arc::new(Table::open(self.allocate_id(), &dir, &self.config)?);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Unregister a table and delete its directory
    pub fn drop_table(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let removed = self.tables.write().remove(name);
        let dir = self.table_dir(name);
        if removed.is_none() && !dir.exists() {
            return Err(LStoreError::NoSuchTable(name.to_string()));
        }
        if let Some(table) = removed {
            table.stop_merge_worker();
        }
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        info!(table = name, "dropped table");
        Ok(())
    }

    /// Persist every open table
    ///
    /// Each table is attempted even if an earlier one fails; the first error
    /// is returned.
    pub fn close(&self) -> Result<()> {
        let tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();
        let mut first_error = None;
        for table in tables {
            if let Err(e) = table.close() {
                error!(table = table.name(), error = %e, "failed to persist table");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(data_dir = %self.config.data_dir.display(), "closed database");
                Ok(())
            }
        }
    }

    /// Names of the registered tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn table_dir(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(name)
    }

    fn allocate_id(&self) -> u32 {
        self.next_table_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Table names become directory names
fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(LStoreError::Config(format!("invalid table name {:?}", name)));
    }
    Ok(())
}
