//! File-backed journal for persistent storage.

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};
use crate::frame::{encode_frame, scan_frames, JournalScan};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal stored in a single file.
///
/// # Durability
///
/// - `flush()` pushes buffered data to the OS
/// - `sync()` calls `File::sync_all()` so data is on disk
/// - `rewrite()` writes a sibling temp file, syncs it, then renames it over
///   the journal
///
/// # Example
///
/// ```no_run
/// use smsrelay_storage::{FileJournal, JournalBackend};
/// use std::path::Path;
///
/// let mut journal = FileJournal::open(Path::new("documents.journal")).unwrap();
/// journal.append_frame(b"record").unwrap();
/// journal.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileJournal {
    /// Opens or creates a journal file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = open_rw(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Opens or creates a journal file, creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".rewrite");
        self.path.with_file_name(name)
    }
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

impl JournalBackend for FileJournal {
    fn append_frame(&mut self, payload: &[u8]) -> StorageResult<u64> {
        let frame = encode_frame(payload)?;

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&frame)?;
        *size += frame.len() as u64;

        Ok(offset)
    }

    fn scan(&self) -> StorageResult<JournalScan> {
        let size = *self.size.read();
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;

        let mut bytes = Vec::with_capacity(size as usize);
        Read::by_ref(&mut *file).take(size).read_to_end(&mut bytes)?;

        scan_frames(&bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.write().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: *size,
            });
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }

    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> StorageResult<()> {
        let temp_path = self.temp_path();
        let mut written = 0u64;
        {
            let mut temp = File::create(&temp_path)?;
            for payload in payloads {
                let frame = encode_frame(payload)?;
                temp.write_all(&frame)?;
                written += frame.len() as u64;
            }
            temp.sync_all()?;
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        fs::rename(&temp_path, &self.path)?;
        *file = open_rw(&self.path)?;
        *size = written;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn frames_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        {
            let mut journal = FileJournal::open(&path).unwrap();
            journal.append_frame(b"first").unwrap();
            journal.append_frame(b"second").unwrap();
            journal.sync().unwrap();
        }

        let journal = FileJournal::open(&path).unwrap();
        let scan = journal.scan().unwrap();
        assert!(scan.is_clean());
        assert_eq!(scan.frames.len(), 2);
        assert_eq!(scan.frames[1].payload, b"second");
    }

    #[test]
    fn torn_tail_on_disk_is_reported_then_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        {
            let mut journal = FileJournal::open(&path).unwrap();
            journal.append_frame(b"intact").unwrap();
            journal.sync().unwrap();
        }
        {
            let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
            raw.write_all(b"SRJ1\x40\x00").unwrap();
        }

        let mut journal = FileJournal::open(&path).unwrap();
        let scan = journal.scan().unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert!(scan.torn_tail.is_some());

        journal.truncate(scan.valid_len).unwrap();
        assert!(journal.scan().unwrap().is_clean());
        assert_eq!(fs::metadata(&path).unwrap().len(), scan.valid_len);
    }

    #[test]
    fn rewrite_replaces_file_and_keeps_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        let mut journal = FileJournal::open(&path).unwrap();
        for i in 0..5u8 {
            journal.append_frame(&[i; 32]).unwrap();
        }
        let before = journal.size().unwrap();

        journal.rewrite(&[b"snapshot".to_vec()]).unwrap();
        assert!(journal.size().unwrap() < before);
        assert!(!journal.temp_path().exists());

        journal.append_frame(b"after").unwrap();
        drop(journal);

        let journal = FileJournal::open(&path).unwrap();
        let scan = journal.scan().unwrap();
        let payloads: Vec<_> = scan.frames.iter().map(|f| f.payload.clone()).collect();
        assert_eq!(payloads, vec![b"snapshot".to_vec(), b"after".to_vec()]);
    }

    #[test]
    fn truncate_beyond_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        let mut journal = FileJournal::open(&path).unwrap();
        journal.append_frame(b"x").unwrap();
        assert!(matches!(
            journal.truncate(10_000),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("documents.journal");

        let journal = FileJournal::open_with_create_dirs(&path).unwrap();
        assert_eq!(journal.size().unwrap(), 0);
        assert_eq!(journal.path(), path);
    }
}
