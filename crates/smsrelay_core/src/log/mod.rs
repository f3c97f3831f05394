//! The per-device notification log.
//!
//! Each device owns a bounded queue of notifications linked in both
//! directions. The newest entry is the queue's `first`, the oldest its
//! `last`. Appending past the limit evicts exactly one entry from the tail.
//!
//! Two backings share the contract:
//! - [`MemoryLog`] keeps an id-indexed arena per device in process memory
//! - [`DocumentLog`] stores queue and node records in a
//!   [`smsrelay_docstore::DocumentStore`], one atomic batch per append

mod document;
mod memory;

pub use document::DocumentLog;
pub use memory::MemoryLog;

use crate::error::RelayResult;
use crate::notification::{NewNotification, Notification, NotificationId};
use crate::verify::{check_chain, ChainReport};
use std::collections::HashMap;

/// Queue metadata for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    /// Owning device.
    pub device_id: String,
    /// Newest notification.
    pub first_id: Option<NotificationId>,
    /// Oldest notification.
    pub last_id: Option<NotificationId>,
    /// Current number of notifications.
    pub length: u64,
    /// Retention limit.
    pub max_length: u64,
}

/// Neighbor links of one stored node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLinks {
    /// Toward older.
    pub previous: Option<NotificationId>,
    /// Toward newer.
    pub next: Option<NotificationId>,
}

/// Raw linkage of one device's queue, as stored.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    /// Queue metadata.
    pub info: QueueInfo,
    /// Every stored node owned by the device.
    pub nodes: HashMap<NotificationId, NodeLinks>,
}

/// A bounded, bidirectionally traversable notification log per device.
///
/// Lookups of unknown devices or ids are not errors: they yield `None` or an
/// empty `Vec`. Appends to the same device are serialized; appends to
/// different devices don't contend.
pub trait NotificationLog: Send + Sync {
    /// Appends a notification as the device's newest entry.
    ///
    /// Creates the device's queue on first use. Evicts the oldest entry if
    /// the queue is over its limit afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails; nothing is stored then.
    fn append(&self, device_id: &str, new: NewNotification) -> RelayResult<Notification>;

    /// Returns up to `limit` notifications newer than `start`, oldest first.
    ///
    /// With no cursor, or one this device doesn't hold, iteration starts at
    /// the oldest notification.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn forward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>>;

    /// Returns up to `limit` notifications older than `start`, newest first.
    ///
    /// With no cursor, or one this device doesn't hold, iteration starts at
    /// the newest notification.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn backward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>>;

    /// Returns the device's oldest notification.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn oldest(&self, device_id: &str) -> RelayResult<Option<Notification>>;

    /// Returns the device's newest notification.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn latest(&self, device_id: &str) -> RelayResult<Option<Notification>>;

    /// Returns the device's queue metadata.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn queue_info(&self, device_id: &str) -> RelayResult<Option<QueueInfo>>;

    /// Returns every device that has a queue, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn devices(&self) -> RelayResult<Vec<String>>;

    /// Returns the raw linkage of the device's queue.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure or corruption.
    fn chain_snapshot(&self, device_id: &str) -> RelayResult<Option<ChainSnapshot>>;

    /// Walks the device's queue in both directions and checks its invariants.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure; broken links are reported in
    /// the [`ChainReport`].
    fn verify_chain(&self, device_id: &str) -> RelayResult<ChainReport> {
        Ok(match self.chain_snapshot(device_id)? {
            Some(snapshot) => check_chain(&snapshot),
            None => ChainReport::empty(device_id),
        })
    }
}
