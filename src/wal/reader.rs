//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use crate::error::{DocError, Result};
use crate::storage::line_file::LineIter;

use super::{Wal, WalEntry};

impl Wal {
    /// Iterate over all entries in append order
    ///
    /// Each call starts a fresh pass over the file. A missing WAL yields an
    /// empty sequence.
    pub fn scan(&self) -> Result<WalIterator> {
        Ok(WalIterator {
            lines: self.file.lines()?,
            line_no: 0,
        })
    }

    /// Collect every entry in append order
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        self.scan()?.collect()
    }

    /// Number of complete, non-empty entries
    pub fn count(&self) -> Result<usize> {
        self.file.count()
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    lines: LineIter,
    /// 1-based position of the last line yielded, for error reports
    line_no: u64,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, line) = match self.lines.next()? {
            Ok(item) => item,
            Err(e) => return Some(Err(e)),
        };
        self.line_no += 1;

        let line_no = self.line_no;
        Some(WalEntry::decode(&line).map_err(|e| DocError::WalCorruption {
            line: line_no,
            reason: e.to_string(),
        }))
    }
}
