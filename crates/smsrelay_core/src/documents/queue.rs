//! Per-device queue metadata stored as a document.

use crate::error::{RelayError, RelayResult};
use crate::log::QueueInfo;
use crate::notification::NotificationId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use smsrelay_docstore::{Document, DocumentStore, VersionedDocument};

/// Collection holding queue documents.
pub const QUEUES: &str = "queues";

#[derive(Serialize, Deserialize)]
struct QueueBody {
    device_id: String,
    #[serde(default)]
    first_notification_id: String,
    #[serde(default)]
    last_notification_id: String,
    cur_length: u64,
    max_length: u64,
}

/// Queue metadata for one device.
///
/// `first` is the newest node, `last` the oldest. Empty strings mark an
/// empty queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDoc {
    /// Document id.
    pub id: String,
    /// Store version the metadata was read at; `None` if not yet stored.
    pub version: Option<u64>,
    /// Owning device.
    pub device_id: String,
    /// Newest node id.
    pub first: String,
    /// Oldest node id.
    pub last: String,
    /// Current length.
    pub length: u64,
    /// Retention limit.
    pub max_length: u64,
}

impl QueueDoc {
    /// Creates metadata for a brand new, empty queue.
    pub fn new(id: String, device_id: &str, max_length: u64) -> Self {
        Self {
            id,
            version: None,
            device_id: device_id.to_string(),
            first: String::new(),
            last: String::new(),
            length: 0,
            max_length,
        }
    }

    /// Decodes a stored queue document.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Corrupted`] if the document has the wrong shape.
    pub fn decode(doc: VersionedDocument) -> RelayResult<Self> {
        let body: QueueBody = serde_json::from_value(Value::Object(doc.data))
            .map_err(|e| RelayError::corrupted(format!("queue {}: {e}", doc.id)))?;
        Ok(Self {
            id: doc.id,
            version: Some(doc.version),
            device_id: body.device_id,
            first: body.first_notification_id,
            last: body.last_notification_id,
            length: body.cur_length,
            max_length: body.max_length,
        })
    }

    /// Encodes the metadata as a document body.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Corrupted`] if serialization fails.
    pub fn encode(&self) -> RelayResult<Document> {
        let body = QueueBody {
            device_id: self.device_id.clone(),
            first_notification_id: self.first.clone(),
            last_notification_id: self.last.clone(),
            cur_length: self.length,
            max_length: self.max_length,
        };
        match serde_json::to_value(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RelayError::corrupted("queue did not encode to an object")),
            Err(e) => Err(RelayError::corrupted(format!("queue {}: {e}", self.id))),
        }
    }

    /// Returns true if the queue holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Converts to the backing-independent view.
    #[must_use]
    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            device_id: self.device_id.clone(),
            first_id: NotificationId::cursor(&self.first),
            last_id: NotificationId::cursor(&self.last),
            length: self.length,
            max_length: self.max_length,
        }
    }
}

/// Looks up the queue for `device_id` by field equality.
///
/// # Errors
///
/// Returns an error on store failure or malformed metadata.
pub fn find_queue(store: &dyn DocumentStore, device_id: &str) -> RelayResult<Option<QueueDoc>> {
    store
        .find_first(QUEUES, "device_id", &json!(device_id))?
        .map(QueueDoc::decode)
        .transpose()
}

/// Returns every stored queue.
///
/// # Errors
///
/// Returns an error on store failure or malformed metadata.
pub fn all_queues(store: &dyn DocumentStore) -> RelayResult<Vec<QueueDoc>> {
    store
        .list(QUEUES)?
        .into_iter()
        .map(QueueDoc::decode)
        .collect()
}
