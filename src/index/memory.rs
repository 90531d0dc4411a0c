//! In-memory index store
//!
//! Same contract as [`FileIndex`](super::FileIndex) without persistence.
//! Useful for tests and throwaway engines.

use std::collections::BTreeMap;

use crate::error::Result;

use super::IndexStore;

#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over all keys in order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }
}

impl IndexStore for MemoryIndex {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
