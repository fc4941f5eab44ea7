//! Configuration for LStore
//!
//! Centralized configuration with sensible defaults. A `Config` is handed to
//! the `Database` at open time and shared by every table it creates; there is
//! no process-wide state.

use std::path::PathBuf;

use crate::error::{LStoreError, Result};

/// Main configuration for an LStore database
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {table}/
    ///           ├── table_info
    ///           ├── page_directory
    ///           ├── index
    ///           ├── merge_state
    ///           ├── BaseColumn_{n}
    ///           └── TailColumn_{n}
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Page Layout
    // -------------------------------------------------------------------------
    /// Records per base or tail page
    pub page_capacity: usize,

    /// Base pages per page range
    pub pages_per_range: usize,

    // -------------------------------------------------------------------------
    // Merge Configuration
    // -------------------------------------------------------------------------
    /// Tail writes between two merge triggers
    pub merge_threshold: usize,

    /// Maximum tail records folded by one merge invocation
    pub merge_batch_size: usize,

    /// Where merge passes run
    pub merge_mode: MergeMode,

    // -------------------------------------------------------------------------
    // Buffer Pool Configuration
    // -------------------------------------------------------------------------
    /// Page entries the buffer pool keeps resident
    pub bufferpool_size: usize,

    /// Victim selection policy
    pub eviction_policy: EvictionPolicy,

    /// Seed for random eviction (None = seeded from the OS)
    pub eviction_seed: Option<u64>,
}

/// Merge scheduling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Merge synchronously on the writer that crosses the threshold
    Inline,

    /// Merge on a dedicated worker thread per table
    Background,
}

/// Buffer pool eviction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Uniformly random among unpinned entries
    Random,

    /// Least recently accessed unpinned entry
    Lru,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lstore_data"),
            page_capacity: 512,
            pages_per_range: 16,
            merge_threshold: 100,
            merge_batch_size: 100,
            merge_mode: MergeMode::Inline,
            bufferpool_size: 10,
            eviction_policy: EvictionPolicy::Random,
            eviction_seed: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Records held by one full page range
    pub fn records_per_range(&self) -> usize {
        self.page_capacity * self.pages_per_range
    }

    /// Reject layouts the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.page_capacity == 0 {
            return Err(LStoreError::Config("page_capacity must be > 0".to_string()));
        }
        if self.pages_per_range == 0 {
            return Err(LStoreError::Config("pages_per_range must be > 0".to_string()));
        }
        if self.bufferpool_size == 0 {
            return Err(LStoreError::Config("bufferpool_size must be > 0".to_string()));
        }
        if self.merge_batch_size == 0 {
            return Err(LStoreError::Config("merge_batch_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all tables)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of records per page
    pub fn page_capacity(mut self, records: usize) -> Self {
        self.config.page_capacity = records;
        self
    }

    /// Set the number of base pages per page range
    pub fn pages_per_range(mut self, pages: usize) -> Self {
        self.config.pages_per_range = pages;
        self
    }

    /// Set how many tail writes trigger a merge (0 disables automatic merges)
    pub fn merge_threshold(mut self, writes: usize) -> Self {
        self.config.merge_threshold = writes;
        self
    }

    /// Set the maximum tail records per merge pass
    pub fn merge_batch_size(mut self, records: usize) -> Self {
        self.config.merge_batch_size = records;
        self
    }

    /// Set the merge scheduling strategy
    pub fn merge_mode(mut self, mode: MergeMode) -> Self {
        self.config.merge_mode = mode;
        self
    }

    /// Set the buffer pool capacity (in page entries)
    pub fn bufferpool_size(mut self, pages: usize) -> Self {
        self.config.bufferpool_size = pages;
        self
    }

    /// Set the eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Seed random eviction for reproducible runs
    pub fn eviction_seed(mut self, seed: u64) -> Self {
        self.config.eviction_seed = Some(seed);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
