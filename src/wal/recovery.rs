//! WAL Recovery
//!
//! Cleans up after a crash before the WAL is used again.

use crate::error::Result;

use super::Wal;

/// Result of a recovery pass over the WAL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalRecovery {
    /// Complete entries found in the WAL
    pub entries: usize,

    /// Bytes of a torn final entry that were removed
    pub truncated_bytes: u64,
}

impl WalRecovery {
    /// Whether the WAL was truncated (partial write removed)
    pub fn was_truncated(&self) -> bool {
        self.truncated_bytes > 0
    }
}

impl Wal {
    /// Drop a torn final entry and count what survives
    ///
    /// An entry whose trailing newline never reached the disk was never
    /// acknowledged, so removing it keeps the "fully durable or absent"
    /// guarantee. Complete entries are validated: a complete line that does
    /// not decode is corruption and is reported, not skipped.
    pub fn recover(&mut self) -> Result<WalRecovery> {
        let truncated_bytes = self.file.truncate_torn_tail()?;
        if truncated_bytes > 0 {
            tracing::warn!(
                path = %self.file.path().display(),
                bytes = truncated_bytes,
                "truncated torn tail of WAL"
            );
        }

        let mut entries = 0;
        for entry in self.scan()? {
            entry?;
            entries += 1;
        }

        Ok(WalRecovery {
            entries,
            truncated_bytes,
        })
    }
}
