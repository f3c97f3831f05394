//! Journal-backed document store.
//!
//! All documents live in an in-memory index rebuilt from the journal on open.
//! Every committed batch is appended as one frame, so a batch is either fully
//! replayed or, if its frame was torn by a crash, not replayed at all.

use crate::batch::{Action, BatchOp, CommitReceipt, WriteBatch};
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::document::{Document, DocumentId, VersionedDocument};
use crate::error::{DocStoreError, DocStoreResult};
use crate::record::{JournalRecord, RecordOp, SnapshotEntry};
use crate::store::DocumentStore;
use parking_lot::RwLock;
use serde_json::Value;
use smsrelay_storage::{FileJournal, JournalBackend, MemoryJournal};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Document store over an in-memory journal.
pub type MemoryDocumentStore = JournalDocumentStore<MemoryJournal>;

/// Document store over a locked directory on disk.
pub type DirDocumentStore = JournalDocumentStore<FileJournal>;

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    data: Document,
}

struct State<B> {
    backend: B,
    collections: HashMap<String, BTreeMap<DocumentId, Entry>>,
    sequence: u64,
}

/// A decoded journal frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    /// Offset of the frame in the journal.
    pub offset: u64,
    /// The decoded record.
    pub record: JournalRecord,
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Sequence number of the last commit.
    pub sequence: u64,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Total live documents.
    pub documents: usize,
    /// Live documents per collection.
    pub collections: BTreeMap<String, usize>,
}

/// Result of [`JournalDocumentStore::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Journal size before compaction.
    pub bytes_before: u64,
    /// Journal size after compaction.
    pub bytes_after: u64,
    /// Documents written to the snapshot.
    pub documents: usize,
}

/// A [`DocumentStore`] persisted through a [`JournalBackend`].
///
/// # Example
///
/// ```rust
/// use smsrelay_docstore::{DocumentStore, MemoryDocumentStore, WriteBatch};
/// use serde_json::{json, Map};
///
/// let store = MemoryDocumentStore::in_memory();
/// let mut data = Map::new();
/// data.insert("device_id".into(), json!("phone-1"));
///
/// let mut batch = WriteBatch::new();
/// batch.create("queues", "q1", data);
/// let receipt = store.commit(batch).unwrap();
///
/// let doc = store.get("queues", "q1").unwrap().unwrap();
/// assert_eq!(doc.version, receipt.sequence);
/// ```
pub struct JournalDocumentStore<B: JournalBackend> {
    state: RwLock<State<B>>,
    config: StoreConfig,
    _dir: Option<StoreDir>,
}

impl<B: JournalBackend> fmt::Debug for JournalDocumentStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalDocumentStore")
            .field("sequence", &self.sequence())
            .field("config", &self.config)
            .field("dir", &self._dir)
            .finish_non_exhaustive()
    }
}

impl MemoryDocumentStore {
    /// Creates an empty store over a fresh in-memory journal.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(State {
                backend: MemoryJournal::new(),
                collections: HashMap::new(),
                sequence: 0,
            }),
            config: StoreConfig::default(),
            _dir: None,
        }
    }
}

impl DirDocumentStore {
    /// Opens a store directory, taking its exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Locked`] if another opener holds the
    /// directory, or any error from replaying the journal.
    pub fn open_dir(path: &Path, config: StoreConfig) -> DocStoreResult<Self> {
        let dir = StoreDir::open(path, &config)?;
        let backend = FileJournal::open(&dir.journal_path())?;
        Self::open_inner(backend, config, Some(dir))
    }
}

impl<B: JournalBackend> JournalDocumentStore<B> {
    /// Opens a store over an existing journal, replaying it.
    ///
    /// A torn tail is truncated away with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Corrupted`] if an intact frame cannot be
    /// decoded or sequence numbers go backwards.
    pub fn open(backend: B, config: StoreConfig) -> DocStoreResult<Self> {
        Self::open_inner(backend, config, None)
    }

    fn open_inner(mut backend: B, config: StoreConfig, dir: Option<StoreDir>) -> DocStoreResult<Self> {
        let scan = backend.scan()?;
        if let Some(torn) = &scan.torn_tail {
            warn!(
                offset = torn.offset,
                reason = %torn.reason,
                "truncating torn journal tail"
            );
            backend.truncate(scan.valid_len)?;
        }

        let mut state = State {
            backend,
            collections: HashMap::new(),
            sequence: 0,
        };
        for frame in &scan.frames {
            let record = JournalRecord::decode(&frame.payload).map_err(|e| {
                DocStoreError::corrupted(format!("record at offset {}: {e}", frame.offset))
            })?;
            state.replay(record, frame.offset)?;
        }

        info!(
            sequence = state.sequence,
            frames = scan.frames.len(),
            "document store opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            config,
            _dir: dir,
        })
    }

    /// Returns the sequence number of the last commit.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal size cannot be read.
    pub fn stats(&self) -> DocStoreResult<StoreStats> {
        let state = self.state.read();
        let collections: BTreeMap<String, usize> = state
            .collections
            .iter()
            .map(|(name, docs)| (name.clone(), docs.len()))
            .collect();
        Ok(StoreStats {
            sequence: state.sequence,
            journal_bytes: state.backend.size()?,
            documents: collections.values().sum(),
            collections,
        })
    }

    /// Decodes every record currently in the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be read or a record does not
    /// decode.
    pub fn records(&self) -> DocStoreResult<Vec<RecordEntry>> {
        let state = self.state.read();
        let scan = state.backend.scan()?;
        scan.frames
            .into_iter()
            .map(|frame| -> DocStoreResult<RecordEntry> {
                Ok(RecordEntry {
                    offset: frame.offset,
                    record: JournalRecord::decode(&frame.payload)?,
                })
            })
            .collect()
    }

    /// Rewrites the journal as a single snapshot of the live documents.
    ///
    /// Logical state, versions and the sequence counter are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the journal rewrite fails.
    pub fn compact(&self) -> DocStoreResult<CompactionReport> {
        let mut state = self.state.write();
        let bytes_before = state.backend.size()?;

        let documents: Vec<SnapshotEntry> = state
            .collections
            .iter()
            .flat_map(|(collection, docs)| {
                docs.iter().map(move |(id, entry)| SnapshotEntry {
                    collection: collection.clone(),
                    id: id.clone(),
                    version: entry.version,
                    data: entry.data.clone(),
                })
            })
            .collect();
        let count = documents.len();

        let payload = JournalRecord::Snapshot {
            sequence: state.sequence,
            documents,
        }
        .encode()?;
        state.backend.rewrite(&[payload])?;
        state.backend.sync()?;

        let bytes_after = state.backend.size()?;
        info!(bytes_before, bytes_after, documents = count, "journal compacted");

        Ok(CompactionReport {
            bytes_before,
            bytes_after,
            documents: count,
        })
    }
}

impl<B: JournalBackend> State<B> {
    fn lookup(&self, collection: &str, id: &str) -> Option<&Entry> {
        self.collections.get(collection).and_then(|docs| docs.get(id))
    }

    fn replay(&mut self, record: JournalRecord, offset: u64) -> DocStoreResult<()> {
        match record {
            JournalRecord::Commit { sequence, ops } => {
                if sequence <= self.sequence {
                    return Err(DocStoreError::corrupted(format!(
                        "commit sequence {sequence} at offset {offset} does not follow {}",
                        self.sequence
                    )));
                }
                self.apply(ops, sequence);
            }
            JournalRecord::Snapshot {
                sequence,
                documents,
            } => {
                if sequence < self.sequence {
                    return Err(DocStoreError::corrupted(format!(
                        "snapshot sequence {sequence} at offset {offset} precedes {}",
                        self.sequence
                    )));
                }
                self.collections.clear();
                for doc in documents {
                    if doc.version > sequence {
                        return Err(DocStoreError::corrupted(format!(
                            "snapshot document {}/{} has version {} beyond {sequence}",
                            doc.collection, doc.id, doc.version
                        )));
                    }
                    self.collections.entry(doc.collection).or_default().insert(
                        doc.id,
                        Entry {
                            version: doc.version,
                            data: doc.data,
                        },
                    );
                }
                self.sequence = sequence;
            }
        }
        Ok(())
    }

    fn apply(&mut self, ops: Vec<RecordOp>, sequence: u64) {
        for op in ops {
            match op {
                RecordOp::Put {
                    collection,
                    id,
                    data,
                } => {
                    self.collections.entry(collection).or_default().insert(
                        id,
                        Entry {
                            version: sequence,
                            data,
                        },
                    );
                }
                RecordOp::Delete { collection, id } => {
                    if let Some(docs) = self.collections.get_mut(&collection) {
                        docs.remove(&id);
                        if docs.is_empty() {
                            self.collections.remove(&collection);
                        }
                    }
                }
            }
        }
        self.sequence = sequence;
    }

    /// Validates `ops` in order and resolves them into journal writes.
    fn resolve(&self, ops: Vec<BatchOp>, sequence: u64) -> DocStoreResult<Vec<RecordOp>> {
        // Some(doc) = written earlier in this batch, None = deleted earlier
        let mut staged: HashMap<(String, String), Option<Document>> = HashMap::new();
        let mut resolved = Vec::with_capacity(ops.len());

        for op in ops {
            let key = (op.collection, op.id);
            let (current, version) = match staged.get(&key) {
                Some(Some(doc)) => (Some(doc.clone()), Some(sequence)),
                Some(None) => (None, None),
                None => match self.lookup(&key.0, &key.1) {
                    Some(entry) => (Some(entry.data.clone()), Some(entry.version)),
                    None => (None, None),
                },
            };

            match op.action {
                Action::Require(expected) => {
                    if expected != version {
                        return Err(DocStoreError::Conflict {
                            collection: key.0,
                            id: key.1,
                            expected,
                            actual: version,
                        });
                    }
                }
                Action::Create(data) => {
                    if current.is_some() {
                        return Err(DocStoreError::already_exists(&key.0, &key.1));
                    }
                    resolved.push(put(&key, data.clone()));
                    staged.insert(key, Some(data));
                }
                Action::Set(data) => {
                    resolved.push(put(&key, data.clone()));
                    staged.insert(key, Some(data));
                }
                Action::Merge(fields) => {
                    let Some(mut merged) = current else {
                        return Err(DocStoreError::not_found(&key.0, &key.1));
                    };
                    for (field, value) in fields {
                        merged.insert(field, value);
                    }
                    resolved.push(put(&key, merged.clone()));
                    staged.insert(key, Some(merged));
                }
                Action::Delete => {
                    if current.is_none() {
                        return Err(DocStoreError::not_found(&key.0, &key.1));
                    }
                    resolved.push(RecordOp::Delete {
                        collection: key.0.clone(),
                        id: key.1.clone(),
                    });
                    staged.insert(key, None);
                }
            }
        }

        Ok(resolved)
    }

    /// Appends one frame, rolling the journal back if the write fails.
    fn append(&mut self, payload: &[u8], sync: bool) -> DocStoreResult<()> {
        let before = self.backend.size()?;
        let result = self.backend.append_frame(payload).and_then(|_| {
            if sync {
                self.backend.sync()
            } else {
                self.backend.flush()
            }
        });

        if let Err(err) = result {
            if let Err(rollback) = self.backend.truncate(before) {
                warn!(error = %rollback, "failed to roll back partial journal write");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

fn put(key: &(String, String), data: Document) -> RecordOp {
    RecordOp::Put {
        collection: key.0.clone(),
        id: key.1.clone(),
        data,
    }
}

impl<B: JournalBackend> DocumentStore for JournalDocumentStore<B> {
    fn get(&self, collection: &str, id: &str) -> DocStoreResult<Option<VersionedDocument>> {
        let state = self.state.read();
        Ok(state.lookup(collection, id).map(|entry| VersionedDocument {
            id: id.to_string(),
            version: entry.version,
            data: entry.data.clone(),
        }))
    }

    fn find_first(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> DocStoreResult<Option<VersionedDocument>> {
        let state = self.state.read();
        let Some(docs) = state.collections.get(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .find(|(_, entry)| entry.data.get(field) == Some(value))
            .map(|(id, entry)| VersionedDocument {
                id: id.clone(),
                version: entry.version,
                data: entry.data.clone(),
            }))
    }

    fn list(&self, collection: &str) -> DocStoreResult<Vec<VersionedDocument>> {
        let state = self.state.read();
        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, entry)| VersionedDocument {
                        id: id.clone(),
                        version: entry.version,
                        data: entry.data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> DocStoreResult<CommitReceipt> {
        if batch.is_empty() {
            return Err(DocStoreError::EmptyBatch);
        }
        let operations = batch.len();

        let mut state = self.state.write();
        let sequence = state.sequence + 1;
        let ops = state.resolve(batch.into_ops(), sequence)?;

        let record = JournalRecord::Commit { sequence, ops };
        let payload = record.encode()?;
        state.append(&payload, self.config.sync_on_commit)?;

        if let JournalRecord::Commit { ops, .. } = record {
            state.apply(ops, sequence);
        }
        debug!(sequence, operations, "committed write batch");

        Ok(CommitReceipt {
            sequence,
            operations,
        })
    }
}
