//! Compaction Module
//!
//! Merges the data log with the WAL tail, rewrites the data log, rebuilds
//! the index from scratch and truncates the WAL.
//!
//! ## Algorithm
//! ```text
//!   data.log ──┐
//!              ├─▶ merge ─▶ rewrite data.log ─▶ rebuild index ─▶ clear WAL
//!   wal.log ───┘   (1)        (2, tmp+rename)      (3)             (4)
//! ```
//! The WAL is cleared last: until steps 2 and 3 have both succeeded it is
//! the only copy of anything not yet reflected on disk, and a compaction
//! interrupted anywhere before step 4 can simply be run again.

use std::collections::HashMap;

use crate::error::Result;
use crate::index::{primary_key, secondary_key, IndexStore};
use crate::record::{Record, RecordId};
use crate::storage::DataLog;
use crate::wal::{Wal, WalOp};

/// Summary of one compaction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Records written to the new data log
    pub records_retained: usize,

    /// Lines read from the old data log, superseded versions included
    pub data_lines_read: usize,

    /// WAL entries replayed on top of the data log
    pub wal_entries_replayed: usize,

    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Current logical record set in first-seen order
///
/// An id removed by a delete and introduced again later moves to the end.
#[derive(Debug, Default)]
pub struct MergedRecords {
    slots: Vec<Option<Record>>,
    positions: HashMap<RecordId, usize>,
}

impl MergedRecords {
    fn upsert(&mut self, record: Record) {
        match self.positions.get(&record.id) {
            Some(&pos) => self.slots[pos] = Some(record),
            None => {
                self.positions.insert(record.id.clone(), self.slots.len());
                self.slots.push(Some(record));
            }
        }
    }

    fn remove(&mut self, id: &RecordId) {
        if let Some(pos) = self.positions.remove(id) {
            self.slots[pos] = None;
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.slots.into_iter().flatten().collect()
    }
}

/// One compaction pass over an engine's storage
///
/// Borrows everything mutably, so no write can interleave with it.
pub struct Compactor<'a, I: IndexStore> {
    data_log: &'a mut DataLog,
    wal: &'a mut Wal,
    index: &'a mut I,
    index_fields: &'a [String],
}

impl<'a, I: IndexStore> Compactor<'a, I> {
    pub fn new(
        data_log: &'a mut DataLog,
        wal: &'a mut Wal,
        index: &'a mut I,
        index_fields: &'a [String],
    ) -> Self {
        Self {
            data_log,
            wal,
            index,
            index_fields,
        }
    }

    /// Run all four steps
    pub fn run(mut self) -> Result<CompactionStats> {
        let bytes_before = self.data_log.size_bytes()?;

        // Step 1: merge
        let (merged, data_lines_read, wal_entries_replayed) = self.merge()?;
        let records_retained = merged.len();
        if merged.is_empty() {
            tracing::debug!("no live records, compacting to an empty data log");
        }
        let records = merged.into_records();

        // Step 2: rewrite
        let spans = self.data_log.rewrite(&records)?;

        // Step 3: reindex
        self.index.clear()?;
        for (record, span) in records.iter().zip(&spans) {
            self.index.put(primary_key(&record.id), &span.to_bytes())?;

            for field in self.index_fields {
                if let Some(value) = record.fields.get(field) {
                    let key = secondary_key(field, value)?;
                    self.index.put_index(&key, record.id.as_bytes())?;
                }
            }
        }
        self.index.sync()?;

        // Step 4: truncate the WAL
        self.wal.clear()?;

        let stats = CompactionStats {
            records_retained,
            data_lines_read,
            wal_entries_replayed,
            bytes_before,
            bytes_after: self.data_log.size_bytes()?,
        };

        tracing::info!(
            records = stats.records_retained,
            data_lines = stats.data_lines_read,
            wal_entries = stats.wal_entries_replayed,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "compaction finished"
        );
        Ok(stats)
    }

    /// Step 1: on-disk snapshot with every logged mutation replayed in order
    ///
    /// Returns the merged set, the data log lines read and the WAL entries
    /// replayed.
    pub fn merge(&self) -> Result<(MergedRecords, usize, usize)> {
        let mut merged = MergedRecords::default();

        let mut data_lines = 0;
        for item in self.data_log.scan()? {
            let (_, record) = item?;
            merged.upsert(record);
            data_lines += 1;
        }

        let mut wal_entries = 0;
        for entry in self.wal.scan()? {
            let entry = entry?;
            match entry.op {
                WalOp::Insert(fields) | WalOp::Update(fields) => {
                    merged.upsert(Record::new(entry.id, fields));
                }
                WalOp::Delete => merged.remove(&entry.id),
            }
            wal_entries += 1;
        }

        Ok((merged, data_lines, wal_entries))
    }
}
