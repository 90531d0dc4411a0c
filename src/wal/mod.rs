//! Write-Ahead Log (WAL) Module
//!
//! The record of truth for every mutation until the next compaction.
//!
//! ## Responsibilities
//! - Append an entry before any data log or index mutation
//! - Full ordered scan (crash-window reads, compaction replay)
//! - Entry count
//! - Full truncation once compaction has made everything durable elsewhere
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ {"op":"insert","id":"6f1c…","ts":1700000000000,"data":{…}}\n     │
//! │ {"op":"update","id":"6f1c…","ts":1700000000042,"data":{…}}\n     │
//! │ {"op":"delete","id":"6f1c…","ts":1700000000097}\n                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//! `data` always holds the complete post-operation field mapping.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{now_millis, OpKind, WalEntry, WalOp};
pub use reader::WalIterator;
pub use recovery::WalRecovery;
pub use writer::Wal;
