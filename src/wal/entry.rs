//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their JSON line
//! encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DocError, Result};
use crate::record::{ensure_no_reserved_field, Fields, Record, RecordId};

/// Operation kind as it appears in the `op` field of a WAL line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

/// Operations that can be logged
///
/// `Insert` and `Update` carry the complete post-operation field mapping,
/// never a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum WalOp {
    Insert(Fields),
    Update(Fields),
    Delete,
}

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry {
    /// The operation to perform
    pub op: WalOp,

    /// Target record
    pub id: RecordId,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

impl WalEntry {
    pub fn insert(id: RecordId, fields: Fields) -> Self {
        Self::stamped(WalOp::Insert(fields), id)
    }

    pub fn update(id: RecordId, fields: Fields) -> Self {
        Self::stamped(WalOp::Update(fields), id)
    }

    pub fn delete(id: RecordId) -> Self {
        Self::stamped(WalOp::Delete, id)
    }

    /// Override the timestamp assigned at construction
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> OpKind {
        match self.op {
            WalOp::Insert(_) => OpKind::Insert,
            WalOp::Update(_) => OpKind::Update,
            WalOp::Delete => OpKind::Delete,
        }
    }

    /// Field mapping for insert/update, `None` for delete
    pub fn fields(&self) -> Option<&Fields> {
        match &self.op {
            WalOp::Insert(fields) | WalOp::Update(fields) => Some(fields),
            WalOp::Delete => None,
        }
    }

    /// The record this entry leaves behind, `None` for delete
    pub fn into_record(self) -> Option<Record> {
        match self.op {
            WalOp::Insert(fields) | WalOp::Update(fields) => Some(Record::new(self.id, fields)),
            WalOp::Delete => None,
        }
    }

    /// Encode as one JSON line (no trailing newline)
    pub fn encode(&self) -> Result<String> {
        if let Some(fields) = self.fields() {
            ensure_no_reserved_field(fields)?;
        }

        let line = serde_json::to_string(&WalLineRef {
            op: self.kind(),
            id: self.id.as_str(),
            ts: self.timestamp,
            data: self.fields(),
        })?;
        Ok(line)
    }

    /// Decode a line produced by [`WalEntry::encode`]
    pub fn decode(line: &str) -> Result<Self> {
        let raw: WalLine = serde_json::from_str(line.trim())?;
        let id = RecordId::new(raw.id)?;

        let op = match (raw.op, raw.data) {
            (OpKind::Insert, Some(fields)) => WalOp::Insert(fields),
            (OpKind::Update, Some(fields)) => WalOp::Update(fields),
            (OpKind::Delete, _) => WalOp::Delete,
            (kind, None) => {
                return Err(DocError::Codec(format!(
                    "{:?} entry for '{}' has no data",
                    kind, id
                )))
            }
        };

        if let WalOp::Insert(fields) | WalOp::Update(fields) = &op {
            ensure_no_reserved_field(fields)?;
        }

        Ok(Self {
            op,
            id,
            timestamp: raw.ts,
        })
    }

    fn stamped(op: WalOp, id: RecordId) -> Self {
        Self {
            op,
            id,
            timestamp: now_millis(),
        }
    }
}

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Serialize)]
struct WalLineRef<'a> {
    op: OpKind,
    id: &'a str,
    ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Fields>,
}

#[derive(Deserialize)]
struct WalLine {
    op: OpKind,
    id: String,
    #[serde(default = "now_millis")]
    ts: u64,
    #[serde(default)]
    data: Option<Fields>,
}
