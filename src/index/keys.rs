//! Index key and value encoding

use serde_json::Value;

use crate::error::Result;
use crate::record::id::{KEY_SEPARATOR, MEMBER_DELIMITER};
use crate::record::RecordId;

/// Primary key of a record: its raw id bytes
pub fn primary_key(id: &RecordId) -> &[u8] {
    id.as_bytes()
}

/// Secondary key for a field/value pair: `"<field>:<json value>"`
pub fn secondary_key(field: &str, value: &Value) -> Result<Vec<u8>> {
    let encoded = serde_json::to_string(value)?;

    let mut key = Vec::with_capacity(field.len() + 1 + encoded.len());
    key.extend_from_slice(field.as_bytes());
    key.push(KEY_SEPARATOR as u8);
    key.extend_from_slice(encoded.as_bytes());
    Ok(key)
}

/// Join member ids with `,`
pub fn join_members(members: &[Vec<u8>]) -> Vec<u8> {
    members.join(&(MEMBER_DELIMITER as u8))
}

/// Split a `,`-joined member list (empty segments are ignored)
pub fn split_members(value: &[u8]) -> Vec<Vec<u8>> {
    value
        .split(|&b| b == MEMBER_DELIMITER as u8)
        .filter(|m| !m.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}
