//! In-process notification log.

use super::{ChainSnapshot, NodeLinks, NotificationLog, QueueInfo};
use crate::config::LogConfig;
use crate::error::RelayResult;
use crate::notification::{NewNotification, Notification, NotificationId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct Node {
    previous: Option<NotificationId>,
    next: Option<NotificationId>,
    notification: Notification,
}

/// One device's queue: an id-indexed arena plus head and tail ids.
#[derive(Debug)]
struct DeviceQueue {
    nodes: HashMap<NotificationId, Node>,
    first: Option<NotificationId>,
    last: Option<NotificationId>,
    length: u64,
    max_length: u64,
}

impl DeviceQueue {
    fn new(max_length: u64) -> Self {
        Self {
            nodes: HashMap::new(),
            first: None,
            last: None,
            length: 0,
            max_length,
        }
    }

    fn push_head(&mut self, notification: Notification) -> Option<NotificationId> {
        let id = notification.id.clone();
        let previous = self.first.take();

        if let Some(head) = previous.as_ref().and_then(|h| self.nodes.get_mut(h)) {
            head.next = Some(id.clone());
        }
        self.nodes.insert(
            id.clone(),
            Node {
                previous,
                next: None,
                notification,
            },
        );
        if self.last.is_none() {
            self.last = Some(id.clone());
        }
        self.first = Some(id);
        self.length += 1;

        if self.length > self.max_length {
            self.evict_tail()
        } else {
            None
        }
    }

    fn evict_tail(&mut self) -> Option<NotificationId> {
        let tail_id = self.last.take()?;
        let tail = self.nodes.remove(&tail_id)?;

        self.last = tail.next;
        match self.last.as_ref().and_then(|id| self.nodes.get_mut(id)) {
            Some(new_tail) => new_tail.previous = None,
            None => self.first = None,
        }
        self.length -= 1;
        Some(tail_id)
    }

    fn start_after(&self, cursor: Option<&NotificationId>, forward: bool) -> Option<NotificationId> {
        match cursor.and_then(|id| self.nodes.get(id)) {
            Some(node) if forward => node.next.clone(),
            Some(node) => node.previous.clone(),
            None if forward => self.last.clone(),
            None => self.first.clone(),
        }
    }

    fn walk(&self, start: Option<&NotificationId>, limit: usize, forward: bool) -> Vec<Notification> {
        let mut out = Vec::new();
        let mut cursor = self.start_after(start, forward);
        while out.len() < limit {
            let Some(node) = cursor.as_ref().and_then(|id| self.nodes.get(id)) else {
                break;
            };
            out.push(node.notification.clone());
            cursor = if forward {
                node.next.clone()
            } else {
                node.previous.clone()
            };
        }
        out
    }

    fn info(&self, device_id: &str) -> QueueInfo {
        QueueInfo {
            device_id: device_id.to_string(),
            first_id: self.first.clone(),
            last_id: self.last.clone(),
            length: self.length,
            max_length: self.max_length,
        }
    }
}

/// A [`NotificationLog`] held entirely in process memory.
///
/// Every device gets its own lock, so appends to different devices never
/// wait on each other.
///
/// # Example
///
/// ```rust
/// use smsrelay_core::{LogConfig, MemoryLog, NewNotification, NotificationLog};
///
/// let log = MemoryLog::new(LogConfig::new().max_queue_length(2)).unwrap();
/// log.append("phone", NewNotification::new("+1555", "a", 1)).unwrap();
/// log.append("phone", NewNotification::new("+1555", "b", 2)).unwrap();
/// log.append("phone", NewNotification::new("+1555", "c", 3)).unwrap();
///
/// let oldest = log.oldest("phone").unwrap().unwrap();
/// assert_eq!(oldest.data, "b");
/// ```
#[derive(Debug)]
pub struct MemoryLog {
    queues: RwLock<HashMap<String, Arc<Mutex<DeviceQueue>>>>,
    config: LogConfig,
}

impl MemoryLog {
    /// Creates an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RelayError::InvalidConfig`] if the configuration is
    /// invalid.
    pub fn new(config: LogConfig) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self {
            queues: RwLock::new(HashMap::new()),
            config,
        })
    }

    fn queue(&self, device_id: &str) -> Option<Arc<Mutex<DeviceQueue>>> {
        self.queues.read().get(device_id).cloned()
    }

    fn queue_or_create(&self, device_id: &str) -> Arc<Mutex<DeviceQueue>> {
        if let Some(queue) = self.queue(device_id) {
            return queue;
        }
        self.queues
            .write()
            .entry(device_id.to_string())
            .or_insert_with(|| {
                debug!(device_id, "creating queue");
                Arc::new(Mutex::new(DeviceQueue::new(self.config.max_queue_length)))
            })
            .clone()
    }
}

impl NotificationLog for MemoryLog {
    fn append(&self, device_id: &str, new: NewNotification) -> RelayResult<Notification> {
        let notification = Notification::from_new(NotificationId::generate(), device_id, new);
        let queue = self.queue_or_create(device_id);

        let evicted = queue.lock().push_head(notification.clone());
        if let Some(evicted) = evicted {
            debug!(device_id, evicted = %evicted, "evicted oldest notification");
        }
        Ok(notification)
    }

    fn forward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>> {
        Ok(self
            .queue(device_id)
            .map(|q| q.lock().walk(start, limit, true))
            .unwrap_or_default())
    }

    fn backward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>> {
        Ok(self
            .queue(device_id)
            .map(|q| q.lock().walk(start, limit, false))
            .unwrap_or_default())
    }

    fn oldest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        Ok(self.forward_from(device_id, None, 1)?.pop())
    }

    fn latest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        Ok(self.backward_from(device_id, None, 1)?.pop())
    }

    fn queue_info(&self, device_id: &str) -> RelayResult<Option<QueueInfo>> {
        Ok(self.queue(device_id).map(|q| q.lock().info(device_id)))
    }

    fn devices(&self) -> RelayResult<Vec<String>> {
        let mut devices: Vec<_> = self.queues.read().keys().cloned().collect();
        devices.sort();
        Ok(devices)
    }

    fn chain_snapshot(&self, device_id: &str) -> RelayResult<Option<ChainSnapshot>> {
        Ok(self.queue(device_id).map(|q| {
            let queue = q.lock();
            ChainSnapshot {
                info: queue.info(device_id),
                nodes: queue
                    .nodes
                    .iter()
                    .map(|(id, node)| {
                        (
                            id.clone(),
                            NodeLinks {
                                previous: node.previous.clone(),
                                next: node.next.clone(),
                            },
                        )
                    })
                    .collect(),
            }
        }))
    }
}
