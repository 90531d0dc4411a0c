//! Record Module
//!
//! The unit of storage: an identifier plus a mapping of field names to
//! JSON values.
//!
//! ## Line Format
//! ```text
//! {"_id":"6f1c…","name":"Alice","age":30}\n
//! ```
//! The identifier travels under the reserved `_id` field; every other key is
//! a user field. One record never spans more than one line.

mod codec;
pub(crate) mod id;

pub use codec::{decode_line, encode_line};
pub use id::RecordId;

use serde::Serialize;
use serde_json::{Map, Value};

/// Field name reserved for the record identifier inside a stored line
pub const ID_FIELD: &str = "_id";

/// Field mapping of a record
pub type Fields = Map<String, Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Look up a single field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Shallow merge: keys in `partial` overwrite, all other keys survive
    pub fn merged_with(&self, partial: &Fields) -> Fields {
        let mut merged = self.fields.clone();
        for (key, value) in partial {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Reject field mappings that would collide with the identifier
pub fn ensure_no_reserved_field(fields: &Fields) -> crate::Result<()> {
    if fields.contains_key(ID_FIELD) {
        return Err(crate::DocError::ReservedField(ID_FIELD.to_string()));
    }
    Ok(())
}
