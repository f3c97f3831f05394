//! In-memory journal for tests and ephemeral servers.

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};
use crate::frame::{encode_frame, scan_frames, JournalScan};
use parking_lot::RwLock;

/// An in-memory journal.
///
/// Holds the encoded frames in a single byte buffer, so torn tails and
/// truncation behave exactly as they do on disk. Content is lost when the
/// journal is dropped.
///
/// # Example
///
/// ```rust
/// use smsrelay_storage::{JournalBackend, MemoryJournal};
///
/// let mut journal = MemoryJournal::new();
/// let first = journal.append_frame(b"a").unwrap();
/// let second = journal.append_frame(b"b").unwrap();
/// assert_eq!(first, 0);
/// assert!(second > first);
/// ```
#[derive(Debug, Default)]
pub struct MemoryJournal {
    bytes: RwLock<Vec<u8>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal over existing raw bytes.
    ///
    /// The bytes are not validated until [`JournalBackend::scan`] is called.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// Returns a copy of the raw journal bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl JournalBackend for MemoryJournal {
    fn append_frame(&mut self, payload: &[u8]) -> StorageResult<u64> {
        let frame = encode_frame(payload)?;
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(&frame);
        Ok(offset)
    }

    fn scan(&self) -> StorageResult<JournalScan> {
        scan_frames(&self.bytes.read())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }

    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> StorageResult<()> {
        let mut fresh = Vec::new();
        for payload in payloads {
            fresh.extend_from_slice(&encode_frame(payload)?);
        }
        *self.bytes.write() = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FRAME_HEADER_SIZE;

    #[test]
    fn new_journal_is_empty() {
        let journal = MemoryJournal::new();
        assert_eq!(journal.size().unwrap(), 0);
        assert!(journal.scan().unwrap().frames.is_empty());
    }

    #[test]
    fn append_returns_header_offsets() {
        let mut journal = MemoryJournal::new();
        assert_eq!(journal.append_frame(b"hello").unwrap(), 0);
        assert_eq!(
            journal.append_frame(b"world").unwrap(),
            (FRAME_HEADER_SIZE + 5) as u64
        );
        assert_eq!(journal.size().unwrap(), 2 * (FRAME_HEADER_SIZE + 5) as u64);
    }

    #[test]
    fn truncate_cuts_frames() {
        let mut journal = MemoryJournal::new();
        journal.append_frame(b"keep").unwrap();
        let second = journal.append_frame(b"drop").unwrap();

        journal.truncate(second).unwrap();
        let scan = journal.scan().unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.frames[0].payload, b"keep");
    }

    #[test]
    fn truncate_beyond_end_fails() {
        let mut journal = MemoryJournal::new();
        journal.append_frame(b"x").unwrap();
        let result = journal.truncate(1000);
        assert!(matches!(
            result,
            Err(StorageError::TruncateBeyondEnd { requested: 1000, .. })
        ));
    }

    #[test]
    fn rewrite_replaces_content() {
        let mut journal = MemoryJournal::new();
        journal.append_frame(b"old-1").unwrap();
        journal.append_frame(b"old-2").unwrap();

        journal.rewrite(&[b"new".to_vec()]).unwrap();
        let scan = journal.scan().unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.frames[0].payload, b"new");
        assert_eq!(scan.frames[0].offset, 0);
    }

    #[test]
    fn torn_bytes_show_up_in_scan() {
        let mut journal = MemoryJournal::new();
        journal.append_frame(b"whole").unwrap();
        let mut raw = journal.to_bytes();
        raw.extend_from_slice(b"SRJ");

        let torn = MemoryJournal::from_bytes(raw);
        let scan = torn.scan().unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert!(!scan.is_clean());
    }

    #[test]
    fn flush_and_sync_are_noops() {
        let mut journal = MemoryJournal::new();
        journal.append_frame(b"data").unwrap();
        assert!(journal.flush().is_ok());
        assert!(journal.sync().is_ok());
    }
}
