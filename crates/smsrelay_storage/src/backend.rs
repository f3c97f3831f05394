//! Journal backend trait definition.

use crate::error::StorageResult;
use crate::frame::JournalScan;

/// A low-level append-only journal.
///
/// Journals are **opaque frame stores**. Each call to [`append_frame`] adds
/// one checksummed frame; [`scan`] returns every intact frame in append order.
/// The document store decides what a payload means.
///
/// # Invariants
///
/// - `append_frame` returns the offset of the frame header
/// - `scan` returns frames in exactly the order they were appended
/// - a frame is either fully visible to `scan` or reported as a torn tail
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryJournal`] - For testing
/// - [`super::FileJournal`] - For persistent storage
///
/// [`append_frame`]: JournalBackend::append_frame
/// [`scan`]: JournalBackend::scan
pub trait JournalBackend: Send + Sync {
    /// Appends one frame holding `payload`.
    ///
    /// Returns the offset where the frame header was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large or an I/O error occurs.
    fn append_frame(&mut self, payload: &[u8]) -> StorageResult<u64>;

    /// Reads every intact frame from the start of the journal.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Corrupted`] if a frame before the last
    /// one is damaged, or an I/O error.
    fn scan(&self) -> StorageResult<JournalScan>;

    /// Flushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the journal in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the journal to `new_size` bytes.
    ///
    /// Used to cut off a torn tail found during recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the whole journal with the given frames.
    ///
    /// Either the old or the new content survives a crash, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if any payload is too large or an I/O error occurs.
    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> StorageResult<()>;
}
