//! Engine Module
//!
//! The document engine that coordinates all components.
//!
//! ## Responsibilities
//! - Order every write as WAL → data log → primary index → secondary index
//! - Serve reads from the index, falling back to the WAL for records that
//!   never made it past the first write step
//! - Clean up torn tails on startup
//! - Hand the whole store to the compactor on request

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::compaction::Compactor;
use crate::config::Config;
use crate::error::{DocError, Result};
use crate::index::{primary_key, secondary_key, FileIndex, IndexStore};
use crate::record::{ensure_no_reserved_field, Fields, Record, RecordId};
use crate::storage::{DataLog, Span};
use crate::wal::{Wal, WalEntry, WalRecovery};

// =============================================================================
// Internal Path Constants
// =============================================================================

/// Record lines, relative to the data directory
pub const DATA_LOG_FILENAME: &str = "data.log";

/// Write-ahead log, relative to the data directory
pub const WAL_FILENAME: &str = "wal.log";

/// Index store directory, relative to the data directory
pub const INDEX_DIR: &str = "index";

/// What startup cleanup found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// WAL entries present and torn bytes removed
    pub wal: WalRecovery,

    /// Torn bytes removed from the end of the data log
    pub data_log_truncated_bytes: u64,
}

/// The main document engine
///
/// ## Concurrency Model: single writer, no internal locking
///
/// Mutating operations take `&mut self`, reads take `&self`. An application
/// sharing one engine between threads wraps it in its own mutex and holds it
/// across every call, `compact` included.
///
/// ## Consistency
///
/// The four write steps are individually durable but not atomic as a
/// group. A crash in between leaves the record reachable only through the
/// WAL, which `get` and `all` consult whenever the primary index has no
/// entry. Nothing heals that state except `compact`.
pub struct Engine<I: IndexStore = FileIndex> {
    /// Engine configuration
    config: Config,

    /// Write-ahead log, the record of truth until the next compaction
    wal: Wal,

    /// Append-only record lines
    data_log: DataLog,

    /// Primary and secondary index
    index: I,

    /// Startup cleanup results
    recovery: RecoveryReport,
}

impl Engine<FileIndex> {
    /// Open or create an engine with the given config
    ///
    /// Uses the journal-backed index store under `{data_dir}/index`.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let index = FileIndex::open(&config.data_dir.join(INDEX_DIR), config.sync_strategy)?;
        Self::with_index(config, index)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory and indexed fields
    pub fn open_path(path: &Path, index_fields: &[&str]) -> Result<Self> {
        let config = Config::builder()
            .data_dir(path)
            .index_fields(index_fields.iter().copied())
            .build();
        Self::open(config)
    }
}

impl<I: IndexStore> Engine<I> {
    /// Open an engine over a caller-supplied index store
    ///
    /// On startup:
    /// 1. Validate config, create the data directory
    /// 2. Drop a torn WAL tail, validate the remaining entries
    /// 3. Drop a torn data log tail
    ///
    /// Existing inconsistencies between WAL, data log and index are left
    /// alone; reads tolerate them and `compact` resolves them.
    pub fn with_index(config: Config, index: I) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let mut wal = Wal::open(&config.data_dir.join(WAL_FILENAME), config.sync_strategy)?;
        let wal_recovery = wal.recover()?;

        let mut data_log = DataLog::open(
            &config.data_dir.join(DATA_LOG_FILENAME),
            config.sync_strategy,
        )?;
        let data_log_truncated_bytes = data_log.recover()?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            wal_entries = wal_recovery.entries,
            index_keys = index.count()?,
            index_fields = ?config.index_fields,
            "engine opened"
        );

        Ok(Self {
            config,
            wal,
            data_log,
            index,
            recovery: RecoveryReport {
                wal: wal_recovery,
                data_log_truncated_bytes,
            },
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new record, returning its freshly generated id
    ///
    /// Steps:
    /// 1. Append `insert` to the WAL (full field mapping)
    /// 2. Append the record line to the data log
    /// 3. Point the primary index at the new line
    /// 4. Add the id to each configured secondary key present
    pub fn insert(&mut self, fields: Fields) -> Result<RecordId> {
        ensure_no_reserved_field(&fields)?;
        let id = RecordId::generate();

        self.wal.append(&WalEntry::insert(id.clone(), fields.clone()))?;

        let record = Record::new(id, fields);
        self.apply_to_data(&record)?;

        tracing::debug!(id = %record.id, "inserted record");
        Ok(record.id)
    }

    /// Shallow-merge `partial` into an existing record
    ///
    /// Returns `false` if the record does not exist. The WAL entry carries
    /// the full merged mapping. Secondary memberships for values that
    /// changed are left in place until compaction.
    pub fn update(&mut self, id: &RecordId, partial: Fields) -> Result<bool> {
        ensure_no_reserved_field(&partial)?;

        let existing = match self.get(id)? {
            Some(record) => record,
            None => return Ok(false),
        };
        let merged = existing.merged_with(&partial);

        self.wal.append(&WalEntry::update(id.clone(), merged.clone()))?;
        self.apply_to_data(&Record::new(id.clone(), merged))?;

        tracing::debug!(id = %id, "updated record");
        Ok(true)
    }

    /// Delete a record
    ///
    /// Returns `false` if the record does not exist. Only the primary index
    /// entry is removed; the dead data log line and secondary memberships
    /// are reclaimed by compaction.
    pub fn delete(&mut self, id: &RecordId) -> Result<bool> {
        if self.get(id)?.is_none() {
            return Ok(false);
        }

        self.wal.append(&WalEntry::delete(id.clone()))?;
        self.index.delete(primary_key(id))?;

        tracing::debug!(id = %id, "deleted record");
        Ok(true)
    }

    /// Merge the data log with the WAL, rewrite it, rebuild the index and
    /// truncate the WAL. Returns the number of records retained.
    pub fn compact(&mut self) -> Result<usize> {
        let stats = Compactor::new(
            &mut self.data_log,
            &mut self.wal,
            &mut self.index,
            &self.config.index_fields,
        )
        .run()?;

        Ok(stats.records_retained)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a record by id
    ///
    /// Search order:
    /// 1. Primary index → exact byte range in the data log
    /// 2. Last WAL entry for the id (crash window between WAL and index)
    pub fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        match self.index.get(primary_key(id))? {
            Some(value) => self.read_indexed(id, &value).map(Some),
            None => self.get_from_wal(id),
        }
    }

    /// Records indexed under `field = value`
    ///
    /// Members of the secondary key are returned in insertion order after
    /// each is re-resolved through `get`; members that no longer resolve
    /// are dropped. Memberships are never pruned before compaction, so a
    /// record whose value has since changed is still returned (with its
    /// current fields) until the next `compact`. Fields that are not
    /// configured for indexing have no secondary keys and match nothing.
    pub fn query(&self, field: &str, value: &Value) -> Result<Vec<Record>> {
        let key = secondary_key(field, value)?;

        let mut records = Vec::new();
        for member in self.index.get_index(&key)? {
            let id = RecordId::from_bytes(&member)?;
            if let Some(record) = self.get(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Every live record, once
    ///
    /// Pass 1 walks the data log in file order (first occurrence fixes the
    /// position of an id) and resolves each id:
    /// 1. Primary index hit → the indexed line
    /// 2. Index miss, WAL names the id → the WAL's last entry (absent if delete)
    /// 3. Index miss, WAL silent → the id's last data log version
    ///
    /// Pass 2 surfaces ids that only exist in the WAL, in WAL order.
    pub fn all(&self) -> Result<Vec<Record>> {
        let wal_state = WalState::load(&self.wal)?;

        let mut order = Vec::new();
        let mut latest: HashMap<RecordId, (Span, Record)> = HashMap::new();
        for item in self.data_log.scan()? {
            let (span, record) = item?;
            if !latest.contains_key(&record.id) {
                order.push(record.id.clone());
            }
            latest.insert(record.id.clone(), (span, record));
        }

        let mut records = Vec::new();
        for id in &order {
            let (span, record) = match latest.remove(id) {
                Some(entry) => entry,
                None => continue,
            };

            match self.index.get(primary_key(id))? {
                Some(value) if Span::from_bytes(&value)? == span => records.push(record),
                Some(value) => records.push(self.read_indexed(id, &value)?),
                None if wal_state.contains(id) => records.extend(wal_state.resolve(id)),
                None => records.push(record),
            }
        }

        let seen: HashSet<&RecordId> = order.iter().collect();

        for id in &wal_state.order {
            if !seen.contains(id) {
                records.extend(wal_state.resolve(id));
            }
        }

        Ok(records)
    }

    /// Number of live records (recomputed from `all` on every call)
    pub fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the engine gracefully
    ///
    /// Syncs any appends still pending under a batched sync strategy.
    pub fn close(mut self) -> Result<()> {
        self.wal.sync()?;
        self.data_log.sync()?;
        self.index.sync()?;
        tracing::debug!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// What startup cleanup found
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Number of entries currently in the WAL
    pub fn wal_len(&self) -> Result<usize> {
        self.wal.count()
    }

    /// Size of the data log in bytes, dead lines included
    pub fn data_log_size(&self) -> Result<u64> {
        self.data_log.size_bytes()
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Steps 2-4 of a write: data log, primary index, secondary index
    fn apply_to_data(&mut self, record: &Record) -> Result<()> {
        let span = self.data_log.append(record)?;
        self.index.put(primary_key(&record.id), &span.to_bytes())?;

        for field in &self.config.index_fields {
            if let Some(value) = record.fields.get(field) {
                let key = secondary_key(field, value)?;
                self.index.put_index(&key, record.id.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Read the line a primary index value points at
    fn read_indexed(&self, id: &RecordId, value: &[u8]) -> Result<Record> {
        let span = Span::from_bytes(value)?;
        let record = self.data_log.read(span)?;

        if &record.id != id {
            return Err(DocError::StaleIndex {
                expected: id.to_string(),
                found: record.id.to_string(),
            });
        }
        Ok(record)
    }

    /// Resolve an id from the last WAL entry that names it
    fn get_from_wal(&self, id: &RecordId) -> Result<Option<Record>> {
        let mut last = None;
        for entry in self.wal.scan()? {
            let entry = entry?;
            if &entry.id == id {
                last = Some(entry);
            }
        }
        Ok(last.and_then(WalEntry::into_record))
    }
}

/// Last WAL entry per id, plus first-appearance order, from one scan
struct WalState {
    order: Vec<RecordId>,
    last: HashMap<RecordId, WalEntry>,
}

impl WalState {
    fn load(wal: &Wal) -> Result<Self> {
        let mut order = Vec::new();
        let mut last = HashMap::new();

        for entry in wal.scan()? {
            let entry = entry?;
            if !last.contains_key(&entry.id) {
                order.push(entry.id.clone());
            }
            last.insert(entry.id.clone(), entry);
        }

        Ok(Self { order, last })
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.last.contains_key(id)
    }

    /// The record left by the id's last entry, `None` if deleted or unknown
    fn resolve(&self, id: &RecordId) -> Option<Record> {
        self.last
            .get(id)
            .and_then(|entry| entry.fields())
            .map(|fields| Record::new(id.clone(), fields.clone()))
    }
}
