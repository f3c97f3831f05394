//! Linked-list nodes stored as documents.
//!
//! A node document looks like:
//!
//! ```json
//! {
//!   "device_id": "phone-1",
//!   "next": "<newer id or empty>",
//!   "previous": "<older id or empty>",
//!   "data": {"contact_info": "+1555...", "data": "body", "timestamp": 1700000000}
//! }
//! ```

use crate::error::{RelayError, RelayResult};
use crate::notification::{Notification, NotificationId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use smsrelay_docstore::{Document, DocumentStore, VersionedDocument, WriteBatch};

/// Collection holding node documents.
pub const NODES: &str = "notifications";

/// Payload stored in a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePayload {
    /// Sender or recipient address.
    pub contact_info: String,
    /// Message body.
    pub data: String,
    /// Device-side timestamp.
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize)]
struct NodeBody {
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    next: String,
    #[serde(default)]
    previous: String,
    data: NodePayload,
}

/// One node of a device's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDoc {
    /// Node id, equal to the notification id.
    pub id: String,
    /// Owning device.
    pub device_id: String,
    /// Newer neighbor, empty at the head.
    pub next: String,
    /// Older neighbor, empty at the tail.
    pub previous: String,
    /// Stored notification content.
    pub payload: NodePayload,
}

impl NodeDoc {
    /// Builds a node for a fresh notification.
    #[must_use]
    pub fn for_notification(notification: &Notification, previous: String) -> Self {
        Self {
            id: notification.id.to_string(),
            device_id: notification.device_id.clone(),
            next: String::new(),
            previous,
            payload: NodePayload {
                contact_info: notification.contact_info.clone(),
                data: notification.data.clone(),
                timestamp: notification.timestamp,
            },
        }
    }

    /// Decodes a stored node document.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Corrupted`] if the document has the wrong shape.
    pub fn decode(doc: VersionedDocument) -> RelayResult<Self> {
        let body: NodeBody = serde_json::from_value(Value::Object(doc.data))
            .map_err(|e| RelayError::corrupted(format!("node {}: {e}", doc.id)))?;
        Ok(Self {
            id: doc.id,
            device_id: body.device_id,
            next: body.next,
            previous: body.previous,
            payload: body.data,
        })
    }

    /// Encodes the node as a document body.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Corrupted`] if serialization fails.
    pub fn encode(&self) -> RelayResult<Document> {
        let body = NodeBody {
            device_id: self.device_id.clone(),
            next: self.next.clone(),
            previous: self.previous.clone(),
            data: self.payload.clone(),
        };
        match serde_json::to_value(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RelayError::corrupted("node did not encode to an object")),
            Err(e) => Err(RelayError::corrupted(format!("node {}: {e}", self.id))),
        }
    }

    /// Converts the node into the notification it stores.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        Notification {
            id: NotificationId::new(self.id),
            device_id: self.device_id,
            contact_info: self.payload.contact_info,
            data: self.payload.data,
            timestamp: self.payload.timestamp,
        }
    }
}

/// Walk direction through a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward newer nodes via `next`.
    Newer,
    /// Toward older nodes via `previous`.
    Older,
}

/// Doubly linked list over a node collection.
///
/// Nodes hold only neighbor ids. Reads go straight to the store; writes are
/// staged into a [`WriteBatch`] so callers can commit them together with
/// queue metadata.
pub struct NodeList<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> NodeList<'a> {
    /// Creates a list view over `store`.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Looks up a node. Missing nodes are `None`.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure or a malformed node.
    pub fn get(&self, id: &str) -> RelayResult<Option<NodeDoc>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.store.get(NODES, id)?.map(NodeDoc::decode).transpose()
    }

    /// Collects up to `limit` nodes, starting at `start` and following
    /// `direction`. Stops early at an empty or dangling link.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure or a malformed node.
    pub fn walk(&self, start: &str, direction: Direction, limit: usize) -> RelayResult<Vec<NodeDoc>> {
        let mut out = Vec::new();
        let mut cursor = start.to_string();
        while out.len() < limit {
            let Some(node) = self.get(&cursor)? else {
                if !cursor.is_empty() {
                    tracing::warn!(node = %cursor, "chain points at a missing node");
                }
                break;
            };
            cursor = match direction {
                Direction::Newer => node.next.clone(),
                Direction::Older => node.previous.clone(),
            };
            out.push(node);
        }
        Ok(out)
    }

    /// Returns every node owned by `device_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure or a malformed node.
    pub fn owned_by(&self, device_id: &str) -> RelayResult<Vec<NodeDoc>> {
        self.store
            .list(NODES)?
            .into_iter()
            .filter(|doc| doc.str_field("device_id") == Some(device_id))
            .map(NodeDoc::decode)
            .collect()
    }

    /// Stages creation of a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be encoded.
    pub fn stage_create(&self, batch: &mut WriteBatch, node: &NodeDoc) -> RelayResult<()> {
        batch.create(NODES, &node.id, node.encode()?);
        Ok(())
    }

    /// Stages an update of a node's `next` link.
    pub fn stage_set_next(&self, batch: &mut WriteBatch, id: &str, next: &str) {
        batch.merge(NODES, id, link_field("next", next));
    }

    /// Stages an update of a node's `previous` link.
    pub fn stage_set_previous(&self, batch: &mut WriteBatch, id: &str, previous: &str) {
        batch.merge(NODES, id, link_field("previous", previous));
    }

    /// Stages removal of a node.
    pub fn stage_delete(&self, batch: &mut WriteBatch, id: &str) {
        batch.delete(NODES, id);
    }
}

fn link_field(name: &str, value: &str) -> Document {
    let mut fields = Document::new();
    fields.insert(name.to_string(), json!(value));
    fields
}
