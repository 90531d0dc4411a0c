//! Record line codec
//!
//! Encoding and decoding of one record to and from one line of JSON.

use serde::Serialize;
use serde_json::Value;

use super::{ensure_no_reserved_field, Fields, Record, RecordId, ID_FIELD};
use crate::error::{DocError, Result};

/// Borrowed view used for encoding, keeps `_id` as the first key
#[derive(Serialize)]
struct LineRef<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(flatten)]
    fields: &'a Fields,
}

/// Encode a record as a single line (no trailing newline)
///
/// Fails with `ReservedField` when the field mapping itself carries `_id`.
pub fn encode_line(record: &Record) -> Result<String> {
    ensure_no_reserved_field(&record.fields)?;

    let line = serde_json::to_string(&LineRef {
        id: record.id.as_str(),
        fields: &record.fields,
    })?;

    Ok(line)
}

/// Decode a line produced by [`encode_line`]
///
/// Surrounding whitespace, including the line terminator, is ignored.
pub fn decode_line(line: &str) -> Result<Record> {
    let mut fields: Fields = serde_json::from_str(line.trim())?;

    let id = match fields.remove(ID_FIELD) {
        Some(Value::String(id)) => RecordId::new(id)?,
        Some(other) => {
            return Err(DocError::Codec(format!(
                "'{}' must be a string, got {}",
                ID_FIELD, other
            )))
        }
        None => {
            return Err(DocError::Codec(format!(
                "record line has no '{}' field",
                ID_FIELD
            )))
        }
    };

    Ok(Record { id, fields })
}
