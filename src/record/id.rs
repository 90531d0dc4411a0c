//! Record identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DocError, Result};

/// Separates member ids inside a secondary index value
pub(crate) const MEMBER_DELIMITER: char = ',';

/// Separates the field name from the encoded value in a secondary key
pub(crate) const KEY_SEPARATOR: char = ':';

/// A validated record identifier
///
/// Ids are stored verbatim as primary index keys and joined with `,` inside
/// secondary index values, so an id may contain neither `,` nor `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random (UUID v4) identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate and wrap an identifier
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("identifier is empty")
        } else if id.contains(MEMBER_DELIMITER) {
            Some("identifier contains ','")
        } else if id.contains(KEY_SEPARATOR) {
            Some("identifier contains ':'")
        } else if id.contains('\n') {
            Some("identifier contains a newline")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(DocError::InvalidRecordId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Decode an id stored as raw index bytes
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes).map_err(|e| {
            DocError::IndexCorruption(format!("record id is not UTF-8: {}", e))
        })?;
        Self::new(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = DocError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
