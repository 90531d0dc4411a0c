//! Configuration for AtlasDoc
//!
//! Centralized configuration with sensible defaults.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{DocError, Result};
use crate::record::ID_FIELD;

/// Main configuration for an AtlasDoc instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── data.log         (record lines)
    ///     ├── wal.log          (write-ahead log)
    ///     └── index/           (index journal)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Field names maintained in the secondary index
    pub index_fields: Vec<String>,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// How often appends to the WAL, data log and index journal are fsynced
    pub sync_strategy: SyncStrategy,
}

/// Sync strategy for append-only files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl SyncStrategy {
    /// Whether an appender holding `pending` unsynced entries must sync now
    pub(crate) fn should_sync(&self, pending: usize) -> bool {
        match *self {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => pending >= count.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlasdoc_data"),
            index_fields: Vec::new(),
            sync_strategy: SyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the indexed field list
    ///
    /// Rejects empty names, the reserved id field and duplicates.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.index_fields {
            if field.is_empty() {
                return Err(DocError::Config("index field name is empty".to_string()));
            }
            if field == ID_FIELD {
                return Err(DocError::Config(format!(
                    "'{}' is the record id and cannot be secondarily indexed",
                    ID_FIELD
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(DocError::Config(format!(
                    "index field '{}' listed twice",
                    field
                )));
            }
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
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Add one secondarily indexed field
    pub fn index_field(mut self, field: impl Into<String>) -> Self {
        self.config.index_fields.push(field.into());
        self
    }

    /// Replace the list of secondarily indexed fields
    pub fn index_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.index_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
