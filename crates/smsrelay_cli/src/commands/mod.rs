//! CLI command implementations.

pub mod compact;
pub mod dump_journal;
pub mod inspect;
pub mod tail;
pub mod verify;

use smsrelay_core::{DocumentLog, LogConfig};
use smsrelay_docstore::{DirDocumentStore, StoreConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens an existing data directory. Fails if the server holds it.
pub fn open_store(path: &Path) -> Result<Arc<DirDocumentStore>, Box<dyn std::error::Error>> {
    if !path.join("documents.journal").exists() {
        return Err(format!("No relay data found at {:?}", path).into());
    }
    let config = StoreConfig::new().create_if_missing(false);
    let store = DirDocumentStore::open_dir(path, config)?;
    tracing::debug!(sequence = store.sequence(), "opened document store");
    Ok(Arc::new(store))
}

/// Opens the notification log stored in a data directory.
pub fn open_log(path: &Path) -> Result<(Arc<DirDocumentStore>, DocumentLog), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let log = DocumentLog::new(store.clone(), LogConfig::default())?;
    Ok((store, log))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempdir().unwrap();
        let err = open_store(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("No relay data"));
    }

    #[test]
    fn opens_seeded_directory() {
        let dir = tempdir().unwrap();
        testing::seed(dir.path(), "phone", 2, 10);
        let (store, _log) = open_log(dir.path()).unwrap();
        assert_eq!(store.sequence(), 2);
    }
}
