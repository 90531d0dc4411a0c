//! Index Module
//!
//! Primary and secondary lookup structures, kept in one ordered
//! byte-string-keyed store.
//!
//! ## Key Space
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────┐
//! │ Key                          │ Value                                │
//! ├──────────────────────────────┼──────────────────────────────────────┤
//! │ <record id>                  │ start: u64 LE (8) | end: u64 LE (8)  │
//! │ <field>:<json value>         │ id1,id2,id3 …                        │
//! └──────────────────────────────┴──────────────────────────────────────┘
//! ```
//! Record ids never contain `:` or `,`, so the two key families cannot
//! collide and member lists need no escaping.
//!
//! ## Staleness
//! Secondary memberships are added on every write and only removed when
//! compaction rebuilds the store. Readers must re-check every member
//! through the primary path.

mod journal;
mod keys;
mod memory;

pub use journal::{FileIndex, JournalReplay};
pub use keys::{join_members, primary_key, secondary_key, split_members};
pub use memory::MemoryIndex;

use crate::error::{DocError, Result};
use crate::record::id::MEMBER_DELIMITER;

/// An embedded, ordered, byte-string-keyed store
///
/// Every call is atomic on its own; there is no multi-key transaction.
/// Mutations take `&mut self`: the engine is the only writer.
pub trait IndexStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove a key, reporting whether it was present
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    /// Remove every key, primary and secondary
    fn clear(&mut self) -> Result<()>;

    /// Number of keys, primary and secondary
    fn count(&self) -> Result<usize>;

    /// Force buffered mutations to stable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    /// Add `member` to the set stored under `key` (no-op if already there)
    fn put_index(&mut self, key: &[u8], member: &[u8]) -> Result<()> {
        if member.is_empty() || member.contains(&(MEMBER_DELIMITER as u8)) {
            return Err(DocError::Index(format!(
                "invalid secondary member {:?}",
                String::from_utf8_lossy(member)
            )));
        }

        let mut members = self.get_index(key)?;
        if members.iter().any(|m| m.as_slice() == member) {
            return Ok(());
        }
        members.push(member.to_vec());
        self.put(key, &join_members(&members))
    }

    /// Members stored under `key`, in insertion order
    fn get_index(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .get(key)?
            .map(|value| split_members(&value))
            .unwrap_or_default())
    }

    /// Remove `member` from the set under `key`, dropping the key when empty
    fn remove_index_key(&mut self, key: &[u8], member: &[u8]) -> Result<()> {
        let mut members = self.get_index(key)?;
        let before = members.len();
        members.retain(|m| m.as_slice() != member);

        if members.len() == before {
            return Ok(());
        }
        if members.is_empty() {
            self.delete(key)?;
        } else {
            self.put(key, &join_members(&members))?;
        }
        Ok(())
    }
}
