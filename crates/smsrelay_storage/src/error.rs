//! Error types for journal operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame in the middle of the journal is damaged.
    ///
    /// Damage at the very end of the journal is a torn tail and is reported
    /// through [`crate::JournalScan::torn_tail`] instead.
    #[error("journal corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the damaged frame.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// A payload does not fit the frame length field.
    #[error("frame payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Rejected payload length.
        len: usize,
    },

    /// Attempted to truncate beyond the current size.
    #[error("cannot truncate to {requested} bytes, journal holds {size}")]
    TruncateBeyondEnd {
        /// Requested size.
        requested: u64,
        /// Current journal size.
        size: u64,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
