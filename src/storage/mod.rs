//! Storage Module
//!
//! The data log: the on-disk home of every record version.
//!
//! ## Responsibilities
//! - Append record lines and report their byte ranges
//! - Read a single record back from a byte range
//! - Scan all lines in file order (used by `all()` and compaction)
//! - Replace the whole file atomically during compaction
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ {"_id":"a…","name":"Alice"}\n   ← span 0..n  │
//! │ {"_id":"b…","name":"Bob"}\n                  │
//! │ {"_id":"a…","name":"Alicia"}\n  ← newer "a"  │
//! │ ...                                          │
//! └──────────────────────────────────────────────┘
//! ```
//! Lines are addressed by byte range through the primary index, never by
//! line number. Superseded lines stay until compaction rewrites the file.

mod data_log;
pub(crate) mod line_file;

use std::fmt;

pub use data_log::{DataLog, DataLogIter};

use crate::error::{DocError, Result};

/// Encoded size of a span inside the primary index: start (8) + end (8)
pub const SPAN_ENCODED_LEN: usize = 16;

/// Half-open byte range `[start, end)` of one line, terminator included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode as two little-endian u64s
    pub fn to_bytes(&self) -> [u8; SPAN_ENCODED_LEN] {
        let mut out = [0u8; SPAN_ENCODED_LEN];
        out[0..8].copy_from_slice(&self.start.to_le_bytes());
        out[8..16].copy_from_slice(&self.end.to_le_bytes());
        out
    }

    /// Decode a primary index value
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SPAN_ENCODED_LEN {
            return Err(DocError::IndexCorruption(format!(
                "primary entry is {} bytes, expected {}",
                bytes.len(),
                SPAN_ENCODED_LEN
            )));
        }

        let mut start = [0u8; 8];
        let mut end = [0u8; 8];
        start.copy_from_slice(&bytes[0..8]);
        end.copy_from_slice(&bytes[8..16]);

        let span = Self::new(u64::from_le_bytes(start), u64::from_le_bytes(end));
        if span.end < span.start {
            return Err(DocError::IndexCorruption(format!(
                "primary entry has inverted range {}",
                span
            )));
        }
        Ok(span)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
