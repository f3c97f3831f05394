//! Journal record format.
//!
//! Each journal frame holds one CBOR-encoded [`JournalRecord`]. Commit
//! records carry fully resolved document bodies, so replay never has to
//! re-run merges.

use crate::document::{Document, DocumentId};
use crate::error::{DocStoreError, DocStoreResult};
use serde::{Deserialize, Serialize};

/// A resolved write inside a commit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RecordOp {
    /// Document now holds exactly `data`.
    Put {
        /// Collection name.
        collection: String,
        /// Document id.
        id: DocumentId,
        /// Full document body.
        data: Document,
    },
    /// Document was removed.
    Delete {
        /// Collection name.
        collection: String,
        /// Document id.
        id: DocumentId,
    },
}

/// One document inside a snapshot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Collection name.
    pub collection: String,
    /// Document id.
    pub id: DocumentId,
    /// Version the document had when the snapshot was taken.
    pub version: u64,
    /// Document body.
    pub data: Document,
}

/// One journal frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalRecord {
    /// A committed write batch.
    Commit {
        /// Batch sequence number.
        sequence: u64,
        /// Resolved writes, in batch order.
        ops: Vec<RecordOp>,
    },
    /// Full store state, written by compaction.
    Snapshot {
        /// Highest sequence number covered by the snapshot.
        sequence: u64,
        /// Every live document.
        documents: Vec<SnapshotEntry>,
    },
}

impl JournalRecord {
    /// Returns the record's sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Commit { sequence, .. } | Self::Snapshot { sequence, .. } => *sequence,
        }
    }

    /// Encodes the record as CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Codec`] if serialization fails.
    pub fn encode(&self) -> DocStoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| DocStoreError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a record from CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Codec`] if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> DocStoreResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| DocStoreError::codec(e.to_string()))
    }
}
