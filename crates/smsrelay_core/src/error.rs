//! Error types for the relay core.

use smsrelay_docstore::DocStoreError;
use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in log, broker and relay operations.
///
/// Unknown devices and unknown notification ids are never errors; they show
/// up as `None` or an empty result.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The document store failed.
    #[error("document store error: {0}")]
    Store(#[from] DocStoreError),

    /// Stored queue or node data does not have the expected shape.
    #[error("corrupted queue data: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl RelayError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
