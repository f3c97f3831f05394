//! Error types for the document store.

use std::io;
use thiserror::Error;

/// Result type for document store operations.
pub type DocStoreResult<T> = Result<T, DocStoreError>;

/// Errors that can occur in document store operations.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// Journal backend error.
    #[error("storage error: {0}")]
    Storage(#[from] smsrelay_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A journal record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Journal content violates the store's invariants.
    #[error("document store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A version precondition did not hold.
    #[error(
        "version conflict on {collection}/{id}: expected {expected:?}, found {actual:?}"
    )]
    Conflict {
        /// Collection of the document.
        collection: String,
        /// Document id.
        id: String,
        /// Version the batch required (`None` = must not exist).
        expected: Option<u64>,
        /// Version actually stored (`None` = absent).
        actual: Option<u64>,
    },

    /// A merge or delete targeted a missing document.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Missing document id.
        id: String,
    },

    /// A create targeted an existing document.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection of the document.
        collection: String,
        /// Existing document id.
        id: String,
    },

    /// A batch without operations was committed.
    #[error("write batch is empty")]
    EmptyBatch,

    /// The store directory is held by another process.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store directory is missing or not a directory.
    #[error("invalid store directory: {message}")]
    InvalidDirectory {
        /// Description of the problem.
        message: String,
    },
}

impl DocStoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(collection: &str, id: &str) -> Self {
        Self::AlreadyExists {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates an invalid directory error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Returns true if the error came from a failed batch precondition.
    ///
    /// Nothing was written when this returns true.
    #[must_use]
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::NotFound { .. } | Self::AlreadyExists { .. }
        )
    }
}
