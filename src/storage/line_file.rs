//! Newline-delimited append-only files
//!
//! Shared by the WAL and the data log. A line only exists once its
//! terminating `\n` is on disk: a failed append is rolled back, and an
//! unterminated tail left by a crash is ignored by readers and removed by
//! [`LineFile::truncate_torn_tail`].

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{DocError, Result};

use super::Span;

/// Chunk size used when searching backwards for the last newline
const TAIL_SCAN_CHUNK: u64 = 4096;

/// Append-only line file, opened per operation
#[derive(Debug)]
pub(crate) struct LineFile {
    path: PathBuf,
    sync_strategy: SyncStrategy,
    /// Appends not yet fsynced
    pending: usize,
}

impl LineFile {
    pub(crate) fn new(path: &Path, sync_strategy: SyncStrategy) -> Self {
        Self {
            path: path.to_path_buf(),
            sync_strategy,
            pending: 0,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and return the byte range it occupies
    ///
    /// On a failed write the file is cut back to its previous length so the
    /// line is absent, never partial.
    pub(crate) fn append(&mut self, line: &str) -> Result<Span> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start = file.metadata()?.len();

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        if let Err(e) = file.write_all(&buf) {
            if let Err(rollback) = file.set_len(start) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial append"
                );
            }
            return Err(e.into());
        }

        self.pending += 1;
        if self.sync_strategy.should_sync(self.pending) {
            file.sync_data()?;
            self.pending = 0;
        }

        Ok(Span::new(start, start + buf.len() as u64))
    }

    /// Force pending appends to stable storage
    pub(crate) fn sync(&mut self) -> Result<()> {
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

    /// Read exactly the bytes of `span`
    ///
    /// A span reaching past the end of the file comes from a bad index
    /// entry and is rejected before anything is allocated.
    pub(crate) fn read_span(&self, span: Span) -> Result<String> {
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        if span.end > file_len {
            return Err(DocError::IndexCorruption(format!(
                "span {} runs past the end of {} ({} bytes)",
                span,
                self.path.display(),
                file_len
            )));
        }
        file.seek(SeekFrom::Start(span.start))?;

        let mut bytes = vec![0u8; span.len() as usize];
        file.read_exact(&mut bytes)?;

        String::from_utf8(bytes)
            .map_err(|e| DocError::Codec(format!("line at {} is not UTF-8: {}", span, e)))
    }

    /// Iterate over complete, non-blank lines in file order
    ///
    /// A missing file yields nothing.
    pub(crate) fn lines(&self) -> Result<LineIter> {
        let reader = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(LineIter {
            reader,
            offset: 0,
            buf: Vec::new(),
        })
    }

    /// Count complete, non-blank lines
    pub(crate) fn count(&self) -> Result<usize> {
        let mut count = 0;
        for line in self.lines()? {
            line?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove the file; a missing file is not an error
    pub(crate) fn remove(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.pending = 0;
        Ok(())
    }

    /// Cut off an unterminated final line, returning the bytes removed
    pub(crate) fn truncate_torn_tail(&mut self) -> Result<u64> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        let keep = last_line_end(&mut file, len)?;
        if keep == len {
            return Ok(0);
        }

        file.set_len(keep)?;
        file.sync_all()?;
        Ok(len - keep)
    }
}

/// Offset just past the last `\n` in the first `len` bytes (0 if none)
fn last_line_end(file: &mut File, len: u64) -> Result<u64> {
    let mut end = len;
    let mut chunk = Vec::new();

    while end > 0 {
        let start = end.saturating_sub(TAIL_SCAN_CHUNK);
        chunk.resize((end - start) as usize, 0);
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;

        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }

    Ok(0)
}

/// Iterator over `(span, line)` pairs of a [`LineFile`]
pub(crate) struct LineIter {
    reader: Option<BufReader<File>>,
    offset: u64,
    buf: Vec<u8>,
}

impl Iterator for LineIter {
    type Item = Result<(Span, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();

            let read = match reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(e.into()));
                }
            };

            if read == 0 {
                self.reader = None;
                return None;
            }

            let start = self.offset;
            self.offset += read as u64;

            // Unterminated tail: the append that wrote it never completed
            if self.buf.last() != Some(&b'\n') {
                tracing::debug!(offset = start, bytes = read, "ignoring torn line at end of file");
                self.reader = None;
                return None;
            }

            let span = Span::new(start, self.offset);
            let line = match String::from_utf8(std::mem::take(&mut self.buf)) {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(DocError::Codec(format!(
                        "line at {} is not UTF-8: {}",
                        span, e
                    ))))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(Ok((span, line)));
        }
    }
}
