//! Notification types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque notification id, assigned by the log on append.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Wraps an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh UUID v4 id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parses a client-supplied cursor. Empty means "no cursor".
    #[must_use]
    pub fn cursor(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| Self(raw.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A notification as submitted by the device, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Sender or recipient address.
    pub contact_info: String,
    /// Message body.
    pub data: String,
    /// Device-side timestamp.
    pub timestamp: i64,
}

impl NewNotification {
    /// Creates a new notification.
    pub fn new(contact_info: impl Into<String>, data: impl Into<String>, timestamp: i64) -> Self {
        Self {
            contact_info: contact_info.into(),
            data: data.into(),
            timestamp,
        }
    }
}

/// A stored notification.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Id assigned on append.
    #[serde(rename = "uuid")]
    pub id: NotificationId,
    /// Device whose log holds the notification.
    pub device_id: String,
    /// Sender or recipient address.
    pub contact_info: String,
    /// Message body.
    pub data: String,
    /// Device-side timestamp.
    pub timestamp: i64,
}

impl Notification {
    /// Builds a stored notification from its parts.
    pub fn from_new(id: NotificationId, device_id: impl Into<String>, new: NewNotification) -> Self {
        Self {
            id,
            device_id: device_id.into(),
            contact_info: new.contact_info,
            data: new.data,
            timestamp: new.timestamp,
        }
    }

    /// Returns true if both carry the same content, ignoring the id.
    #[must_use]
    pub fn same_content(&self, new: &NewNotification) -> bool {
        self.contact_info == new.contact_info
            && self.data == new.data
            && self.timestamp == new.timestamp
    }
}
