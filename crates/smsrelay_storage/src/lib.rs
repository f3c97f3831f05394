//! # smsrelay storage
//!
//! Append-only journal backends for smsrelay.
//!
//! This crate is the lowest layer of the relay's persistence stack. A journal
//! is a sequence of **frames**; each frame carries an opaque payload guarded by
//! a CRC-32 checksum. Backends never interpret payloads - the document store
//! above owns the record format.
//!
//! ## Design Principles
//!
//! - Journals only grow, except for explicit `truncate` and `rewrite`
//! - A torn tail (crash mid-append) is reported, never silently dropped
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryJournal`] - For tests and ephemeral servers
//! - [`FileJournal`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use smsrelay_storage::{JournalBackend, MemoryJournal};
//!
//! let mut journal = MemoryJournal::new();
//! journal.append_frame(b"hello").unwrap();
//! let scan = journal.scan().unwrap();
//! assert_eq!(scan.frames[0].payload, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod frame;
mod memory;

pub use backend::JournalBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileJournal;
pub use frame::{
    compute_crc32, encode_frame, scan_frames, Frame, JournalScan, TornTail, FRAME_HEADER_SIZE,
    FRAME_MAGIC,
};
pub use memory::MemoryJournal;
