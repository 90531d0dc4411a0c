//! Journal-backed index store
//!
//! The default persistent [`IndexStore`]. Every mutation is appended to an
//! on-disk journal before it is applied to an ordered in-memory map; opening
//! the store replays the journal.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ bincode payload │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! CRC covers the payload only. `clear()` truncates the journal to zero
//! bytes, so compaction also compacts the journal.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::error::{DocError, Result};

use super::IndexStore;

/// Frame header: CRC32 (4) + payload length (4)
const FRAME_HEADER_SIZE: usize = 8;

/// Journal file name inside the index directory
const JOURNAL_FILENAME: &str = "index.journal";

/// One logged index mutation
#[derive(Debug, Serialize, Deserialize)]
enum JournalOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Outcome of replaying the journal on open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalReplay {
    /// Records applied
    pub records: u64,

    /// Bytes of a torn final record that were removed
    pub truncated_bytes: u64,
}

/// Persistent index store backed by an append-only journal
#[derive(Debug)]
pub struct FileIndex {
    path: PathBuf,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    sync_strategy: SyncStrategy,
    /// Records appended but not yet fsynced
    pending: usize,
    replay: JournalReplay,
}

impl FileIndex {
    /// Open or create the store in `dir`, replaying any existing journal
    pub fn open(dir: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(JOURNAL_FILENAME);

        let mut index = Self {
            path,
            entries: BTreeMap::new(),
            sync_strategy,
            pending: 0,
            replay: JournalReplay::default(),
        };
        index.replay = index.replay_journal()?;

        tracing::debug!(
            path = %index.path.display(),
            records = index.replay.records,
            keys = index.entries.len(),
            "index journal replayed"
        );
        Ok(index)
    }

    /// What the last replay found
    pub fn replay_report(&self) -> JournalReplay {
        self.replay
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over all keys in order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Rebuild the in-memory map from the journal
    ///
    /// Only a final record too short to hold its header, or shorter than
    /// the length its header claims, counts as a torn write and is cut off.
    /// A complete record failing its CRC or its decode is corruption.
    fn replay_journal(&mut self) -> Result<JournalReplay> {
        let mut data = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(JournalReplay::default());
            }
            Err(e) => return Err(e.into()),
        }

        let mut pos = 0usize;
        let mut records = 0u64;

        while pos < data.len() {
            let (payload, frame_len) = match parse_frame(&data[pos..]) {
                Frame::Complete { payload, frame_len } => (payload, frame_len),
                Frame::Torn => break,
                Frame::BadChecksum => {
                    return Err(DocError::IndexCorruption(format!(
                        "index journal record at offset {} fails its checksum",
                        pos
                    )))
                }
            };

            let op: JournalOp = bincode::deserialize(payload).map_err(|e| {
                DocError::IndexCorruption(format!(
                    "index journal record at offset {} does not decode: {}",
                    pos, e
                ))
            })?;

            self.apply(op);
            records += 1;
            pos += frame_len;
        }

        let truncated_bytes = (data.len() - pos) as u64;
        if truncated_bytes > 0 {
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(pos as u64)?;
            file.sync_all()?;
            tracing::warn!(
                path = %self.path.display(),
                bytes = truncated_bytes,
                "truncated torn tail of index journal"
            );
        }

        Ok(JournalReplay {
            records,
            truncated_bytes,
        })
    }

    /// Append one record to the journal, rolling back on a failed write
    fn log(&mut self, op: &JournalOp) -> Result<()> {
        let payload = bincode::serialize(op)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| DocError::Index(format!("index record of {} bytes", payload.len())))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start = file.metadata()?.len();

        if let Err(e) = file.write_all(&frame) {
            if let Err(rollback) = file.set_len(start) {
                tracing::error!(error = %rollback, "failed to roll back partial index record");
            }
            return Err(e.into());
        }

        self.pending += 1;
        if self.sync_strategy.should_sync(self.pending) {
            file.sync_data()?;
            self.pending = 0;
        }
        Ok(())
    }

    fn apply(&mut self, op: JournalOp) {
        match op {
            JournalOp::Put { key, value } => {
                self.entries.insert(key, value);
            }
            JournalOp::Delete { key } => {
                self.entries.remove(&key);
            }
        }
    }
}

impl IndexStore for FileIndex {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let op = JournalOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.log(&op)?;
        self.apply(op);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if !self.entries.contains_key(key) {
            return Ok(false);
        }
        let op = JournalOp::Delete { key: key.to_vec() };
        self.log(&op)?;
        self.apply(op);
        Ok(true)
    }

    fn clear(&mut self) -> Result<()> {
        match OpenOptions::new().write(true).open(&self.path) {
            Ok(file) => {
                file.set_len(0)?;
                file.sync_all()?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.entries.clear();
        self.pending = 0;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn sync(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        match File::open(&self.path) {
            Ok(file) => file.sync_all()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.pending = 0;
        Ok(())
    }
}

/// One frame at the front of a byte slice
enum Frame<'a> {
    Complete { payload: &'a [u8], frame_len: usize },
    /// Fewer bytes than the header, or than the length it claims
    Torn,
    /// All claimed bytes present, CRC mismatch
    BadChecksum,
}

/// Split one frame off the front of `data`
fn parse_frame(data: &[u8]) -> Frame<'_> {
    if data.len() < FRAME_HEADER_SIZE {
        return Frame::Torn;
    }

    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    crc.copy_from_slice(&data[0..4]);
    len.copy_from_slice(&data[4..8]);
    let crc = u32::from_le_bytes(crc);
    let len = u32::from_le_bytes(len) as usize;

    let frame_len = match FRAME_HEADER_SIZE.checked_add(len) {
        Some(frame_len) if frame_len <= data.len() => frame_len,
        _ => return Frame::Torn,
    };

    let payload = &data[FRAME_HEADER_SIZE..frame_len];
    if crc32fast::hash(payload) != crc {
        return Frame::BadChecksum;
    }
    Frame::Complete { payload, frame_len }
}
