//! WAL Writer
//!
//! Handles appending entries to, and discarding, the WAL file.

use std::fs;
use std::path::Path;

use crate::config::SyncStrategy;
use crate::error::Result;
use crate::storage::line_file::LineFile;

use super::WalEntry;

/// The write-ahead log of one engine
///
/// The file handle is opened per operation; the struct only remembers the
/// path and how many appends are still waiting for an fsync.
#[derive(Debug)]
pub struct Wal {
    pub(super) file: LineFile,
}

impl Wal {
    /// Bind to a WAL file (created lazily on first append)
    ///
    /// Does not touch existing content; call [`Wal::recover`] to drop a torn
    /// tail left by a crash.
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            file: LineFile::new(path, sync_strategy),
        })
    }

    /// Append an entry to the WAL
    ///
    /// The entry is either fully written (newline included) or absent.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let line = entry.encode()?;
        self.file.append(&line)?;

        tracing::trace!(op = ?entry.kind(), id = %entry.id, ts = entry.timestamp, "wal append");
        Ok(())
    }

    /// Discard the whole WAL
    ///
    /// Removing the file is a single atomic directory operation; a later
    /// append starts a fresh file.
    pub fn clear(&mut self) -> Result<()> {
        self.file.remove()?;
        tracing::debug!(path = %self.file.path().display(), "wal cleared");
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
