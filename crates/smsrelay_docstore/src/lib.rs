//! # smsrelay docstore
//!
//! Embedded document store used as the persistent backing of the
//! notification log.
//!
//! Documents are JSON objects grouped into named collections and keyed by
//! opaque ids. Writes go through [`WriteBatch`]es that are validated in full
//! and then appended to the journal as a single frame, so a batch is applied
//! all-or-nothing. Version preconditions give callers compare-and-swap.
//!
//! ## Layout
//!
//! - [`DocumentStore`] - the store contract
//! - [`JournalDocumentStore`] - the implementation over a
//!   [`smsrelay_storage::JournalBackend`]
//! - [`StoreDir`] - locked on-disk directory

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod dir;
mod document;
mod error;
mod journal_store;
mod record;
mod store;

pub use batch::{Action, BatchOp, CommitReceipt, WriteBatch};
pub use config::StoreConfig;
pub use dir::StoreDir;
pub use document::{generate_id, Document, DocumentId, VersionedDocument};
pub use error::{DocStoreError, DocStoreResult};
pub use journal_store::{
    CompactionReport, DirDocumentStore, JournalDocumentStore, MemoryDocumentStore, RecordEntry,
    StoreStats,
};
pub use record::{JournalRecord, RecordOp, SnapshotEntry};
pub use store::DocumentStore;
