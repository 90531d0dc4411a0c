//! Data Log
//!
//! Append-only file of record lines.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{DocError, Result};
use crate::record::{decode_line, encode_line, Record};

use super::line_file::{LineFile, LineIter};
use super::Span;

/// Owns the `data.log` file of one engine
#[derive(Debug)]
pub struct DataLog {
    file: LineFile,
}

impl DataLog {
    /// Bind to a data log file (created lazily on first append)
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            file: LineFile::new(path, sync_strategy),
        })
    }

    /// Drop a torn final line left by an interrupted append
    ///
    /// Returns the number of bytes removed. The torn line was never
    /// referenced by the index, since the index write follows the append.
    pub fn recover(&mut self) -> Result<u64> {
        let removed = self.file.truncate_torn_tail()?;
        if removed > 0 {
            tracing::warn!(
                path = %self.file.path().display(),
                bytes = removed,
                "truncated torn tail of data log"
            );
        }
        Ok(removed)
    }

    /// Append one record line, returning where it landed
    pub fn append(&mut self, record: &Record) -> Result<Span> {
        let line = encode_line(record)?;
        self.file.append(&line)
    }

    /// Read and decode the record stored at `span`
    pub fn read(&self, span: Span) -> Result<Record> {
        let line = self.file.read_span(span)?;
        decode_line(&line)
    }

    /// Iterate over every stored line in file order, superseded versions included
    pub fn scan(&self) -> Result<DataLogIter> {
        Ok(DataLogIter {
            lines: self.file.lines()?,
        })
    }

    /// Atomically replace the file with exactly `records`, in order
    ///
    /// Writes `<name>.tmp`, fsyncs it, then renames it over the live file,
    /// so readers see either the old file or the complete new one. Returns
    /// one span per record, in the same order.
    pub fn rewrite(&mut self, records: &[Record]) -> Result<Vec<Span>> {
        let tmp_path = self.tmp_path();

        let spans = match Self::write_all_records(&tmp_path, records) {
            Ok(spans) => spans,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        fs::rename(&tmp_path, self.file.path())?;
        sync_parent_dir(self.file.path())?;

        Ok(spans)
    }

    /// Force pending appends to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    /// Current size of the file in bytes (0 if it does not exist yet)
    pub fn size_bytes(&self) -> Result<u64> {
        match fs::metadata(self.file.path()) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .file
            .path()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.file.path().with_file_name(name)
    }

    fn write_all_records(path: &Path, records: &[Record]) -> Result<Vec<Span>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let mut spans = Vec::with_capacity(records.len());
        let mut offset = 0u64;
        for record in records {
            let line = encode_line(record)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;

            let end = offset + line.len() as u64 + 1;
            spans.push(Span::new(offset, end));
            offset = end;
        }

        let file = writer
            .into_inner()
            .map_err(|e| DocError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok(spans)
    }
}

/// Make a rename durable by syncing the containing directory
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Iterator over `(span, record)` pairs of a data log
pub struct DataLogIter {
    lines: LineIter,
}

impl Iterator for DataLogIter {
    type Item = Result<(Span, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self
            .lines
            .next()?
            .and_then(|(span, line)| decode_line(&line).map(|record| (span, record)));
        Some(item)
    }
}
