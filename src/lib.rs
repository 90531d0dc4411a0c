//! # AtlasDoc
//!
//! An embedded document store with:
//! - Write-Ahead Logging (WAL) as the record of truth between compactions
//! - Append-only data log addressed by byte ranges
//! - Primary and secondary (field = value) indexes
//! - Reads that survive a crash between the WAL write and the index write
//! - Compaction that merges, rewrites and reindexes everything
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Application                             │
//! │              (serializes access, one writer)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │   insert / get / update / delete / query / all / compact     │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │ (1)              │ (2)              │ (3, 4)
//!        ▼                  ▼                  ▼
//!   ┌─────────┐       ┌───────────┐      ┌───────────┐
//!   │   WAL   │       │ Data Log  │      │   Index   │
//!   │ wal.log │       │ data.log  │      │  index/   │
//!   └────┬────┘       └─────┬─────┘      └─────┬─────┘
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │  Compactor  │
//!                    └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use atlasdoc::{Config, Engine};
//! use serde_json::json;
//!
//! # fn main() -> atlasdoc::Result<()> {
//! let config = Config::builder()
//!     .data_dir("./people")
//!     .index_field("email")
//!     .build();
//! let mut engine = Engine::open(config)?;
//!
//! let fields = json!({"name": "Alice", "email": "alice@example.com"});
//! let id = engine.insert(fields.as_object().cloned().unwrap_or_default())?;
//!
//! assert!(engine.get(&id)?.is_some());
//! assert_eq!(engine.query("email", &json!("alice@example.com"))?.len(), 1);
//!
//! engine.compact()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod wal;
pub mod storage;
pub mod index;
pub mod compaction;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DocError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::Engine;
pub use record::{Fields, Record, RecordId};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDoc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
