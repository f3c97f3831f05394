//! Notification log stored as linked documents.

use super::{ChainSnapshot, NodeLinks, NotificationLog, QueueInfo};
use crate::config::LogConfig;
use crate::documents::{all_queues, find_queue, Direction, NodeDoc, NodeList, QueueDoc, QUEUES};
use crate::error::{RelayError, RelayResult};
use crate::notification::{NewNotification, Notification, NotificationId};
use parking_lot::Mutex;
use smsrelay_docstore::{DocumentStore, WriteBatch};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-device locks.
///
/// Appends and reads of one device's chain are serialized so a reader never
/// sees a queue document whose head or tail an in-flight append has already
/// replaced or deleted.
#[derive(Debug, Default)]
struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    fn for_device(&self, device_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(device_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// A [`NotificationLog`] persisted in a [`DocumentStore`].
///
/// Each device has one queue document (collection `queues`) and one node
/// document per notification (collection `notifications`). An append writes
/// the new node, the old head's `next` link, the queue metadata and any
/// eviction as a single batch guarded by the queue's version.
pub struct DocumentLog {
    store: Arc<dyn DocumentStore>,
    config: LogConfig,
    locks: DeviceLocks,
}

impl DocumentLog {
    /// Creates a log over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] if the configuration is invalid.
    pub fn new(store: Arc<dyn DocumentStore>, config: LogConfig) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: DeviceLocks::default(),
        })
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn nodes(&self) -> NodeList<'_> {
        NodeList::new(self.store.as_ref())
    }

    /// Returns the node for a cursor, if it exists and belongs to the device.
    fn owned_node(&self, device_id: &str, cursor: Option<&NotificationId>) -> RelayResult<Option<NodeDoc>> {
        let Some(cursor) = cursor else {
            return Ok(None);
        };
        Ok(self
            .nodes()
            .get(cursor.as_str())?
            .filter(|node| node.device_id == device_id))
    }

    fn point(&self, id: &str) -> RelayResult<Option<Notification>> {
        let node = self.nodes().get(id)?;
        if node.is_none() && !id.is_empty() {
            warn!(node = id, "queue points at a missing node");
        }
        Ok(node.map(NodeDoc::into_notification))
    }
}

impl NotificationLog for DocumentLog {
    fn append(&self, device_id: &str, new: NewNotification) -> RelayResult<Notification> {
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();

        let nodes = self.nodes();
        let mut batch = WriteBatch::new();

        let mut queue = match find_queue(self.store.as_ref(), device_id)? {
            Some(queue) => {
                batch.require_version(QUEUES, &queue.id, queue.version);
                queue
            }
            None => {
                debug!(device_id, "creating queue");
                QueueDoc::new(self.store.allocate_id(), device_id, self.config.max_queue_length)
            }
        };

        let notification =
            Notification::from_new(NotificationId::new(self.store.allocate_id()), device_id, new);
        let new_id = notification.id.to_string();
        let old_head = std::mem::replace(&mut queue.first, new_id.clone());
        let mut node = NodeDoc::for_notification(&notification, old_head.clone());
        let mut relink_old_head = !old_head.is_empty();

        if queue.is_empty() {
            queue.last = new_id.clone();
        }
        queue.length += 1;

        if queue.length > queue.max_length {
            let tail_id = std::mem::take(&mut queue.last);
            let tail_next = if tail_id == old_head {
                // Single-slot queue: the old head itself goes.
                relink_old_head = false;
                new_id.clone()
            } else {
                let tail = nodes.get(&tail_id)?.ok_or_else(|| {
                    RelayError::corrupted(format!(
                        "queue for {device_id} names missing tail {tail_id}"
                    ))
                })?;
                if tail.next.is_empty() {
                    return Err(RelayError::corrupted(format!(
                        "tail {tail_id} of {device_id} has no successor"
                    )));
                }
                tail.next
            };

            nodes.stage_delete(&mut batch, &tail_id);
            if tail_next == new_id {
                node.previous.clear();
            } else {
                nodes.stage_set_previous(&mut batch, &tail_next, "");
            }
            queue.last = tail_next;
            queue.length -= 1;
            debug!(device_id, evicted = %tail_id, "evicting oldest notification");
        }

        if relink_old_head {
            nodes.stage_set_next(&mut batch, &old_head, &new_id);
        }
        nodes.stage_create(&mut batch, &node)?;
        match queue.version {
            Some(_) => batch.set(QUEUES, &queue.id, queue.encode()?),
            None => batch.create(QUEUES, &queue.id, queue.encode()?),
        };

        let receipt = self.store.commit(batch)?;
        debug!(
            device_id,
            id = %notification.id,
            sequence = receipt.sequence,
            length = queue.length,
            "appended notification"
        );
        Ok(notification)
    }

    fn forward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();
        let Some(queue) = find_queue(self.store.as_ref(), device_id)? else {
            return Ok(Vec::new());
        };
        let begin = match self.owned_node(device_id, start)? {
            Some(node) => node.next,
            None => queue.last,
        };
        Ok(self
            .nodes()
            .walk(&begin, Direction::Newer, limit)?
            .into_iter()
            .map(NodeDoc::into_notification)
            .collect())
    }

    fn backward_from(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();
        let Some(queue) = find_queue(self.store.as_ref(), device_id)? else {
            return Ok(Vec::new());
        };
        let begin = match self.owned_node(device_id, start)? {
            Some(node) => node.previous,
            None => queue.first,
        };
        Ok(self
            .nodes()
            .walk(&begin, Direction::Older, limit)?
            .into_iter()
            .map(NodeDoc::into_notification)
            .collect())
    }

    fn oldest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();
        match find_queue(self.store.as_ref(), device_id)? {
            Some(queue) if !queue.is_empty() => self.point(&queue.last),
            _ => Ok(None),
        }
    }

    fn latest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();
        match find_queue(self.store.as_ref(), device_id)? {
            Some(queue) if !queue.is_empty() => self.point(&queue.first),
            _ => Ok(None),
        }
    }

    fn queue_info(&self, device_id: &str) -> RelayResult<Option<QueueInfo>> {
        Ok(find_queue(self.store.as_ref(), device_id)?.map(|q| q.info()))
    }

    fn devices(&self) -> RelayResult<Vec<String>> {
        let mut devices: Vec<_> = all_queues(self.store.as_ref())?
            .into_iter()
            .map(|q| q.device_id)
            .collect();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }

    fn chain_snapshot(&self, device_id: &str) -> RelayResult<Option<ChainSnapshot>> {
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();
        let Some(queue) = find_queue(self.store.as_ref(), device_id)? else {
            return Ok(None);
        };
        let nodes = self
            .nodes()
            .owned_by(device_id)?
            .into_iter()
            .map(|node| {
                (
                    NotificationId::new(node.id),
                    NodeLinks {
                        previous: NotificationId::cursor(&node.previous),
                        next: NotificationId::cursor(&node.next),
                    },
                )
            })
            .collect();
        Ok(Some(ChainSnapshot {
            info: queue.info(),
            nodes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::NODES;
    use crate::log::contract;
    use serde_json::json;
    use smsrelay_docstore::MemoryDocumentStore;
    use std::thread;

    fn log(max: u64) -> DocumentLog {
        DocumentLog::new(
            Arc::new(MemoryDocumentStore::in_memory()),
            LogConfig::new().max_queue_length(max),
        )
        .unwrap()
    }

    #[test]
    fn round_trip() {
        contract::round_trip(&log(10));
    }

    #[test]
    fn empty_device() {
        contract::empty_device(&log(10));
    }

    #[test]
    fn eviction_scenario() {
        contract::eviction_scenario(&log(2));
    }

    #[test]
    fn single_slot() {
        contract::single_slot(&log(1));
    }

    #[test]
    fn cursors() {
        contract::cursors(&log(100));
    }

    #[test]
    fn devices_are_isolated() {
        contract::devices_are_isolated(&log(10));
    }

    #[test]
    fn evicted_nodes_are_deleted_and_new_tail_unlinked() {
        let log = log(2);
        let a = log.append("dev", contract::sms(1)).unwrap();
        let b = log.append("dev", contract::sms(2)).unwrap();
        log.append("dev", contract::sms(3)).unwrap();

        assert!(log.store().get(NODES, a.id.as_str()).unwrap().is_none());
        let b_doc = log.store().get(NODES, b.id.as_str()).unwrap().unwrap();
        assert_eq!(b_doc.str_field("previous"), Some(""));
        assert_eq!(log.store().list(NODES).unwrap().len(), 2);
    }

    #[test]
    fn queue_document_matches_stored_shape() {
        let log = log(5);
        let n = log.append("phone", contract::sms(1)).unwrap();

        let queue = log
            .store()
            .find_first(QUEUES, "device_id", &json!("phone"))
            .unwrap()
            .unwrap();
        assert_eq!(queue.str_field("first_notification_id"), Some(n.id.as_str()));
        assert_eq!(queue.str_field("last_notification_id"), Some(n.id.as_str()));
        assert_eq!(queue.u64_field("cur_length"), Some(1));
        assert_eq!(queue.u64_field("max_length"), Some(5));
    }

    #[test]
    fn each_append_is_one_commit() {
        let store = Arc::new(MemoryDocumentStore::in_memory());
        let log = DocumentLog::new(store.clone(), LogConfig::new().max_queue_length(2)).unwrap();
        for i in 0..5 {
            log.append("dev", contract::sms(i)).unwrap();
        }
        assert_eq!(store.sequence(), 5);
    }

    #[test]
    fn broken_tail_is_reported_not_papered_over() {
        let store = Arc::new(MemoryDocumentStore::in_memory());
        let log = DocumentLog::new(store.clone(), LogConfig::new().max_queue_length(2)).unwrap();
        let a = log.append("dev", contract::sms(1)).unwrap();
        log.append("dev", contract::sms(2)).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(NODES, a.id.as_str());
        store.commit(batch).unwrap();

        let result = log.append("dev", contract::sms(3));
        assert!(matches!(result, Err(RelayError::Corrupted { .. })));
        assert!(!log.verify_chain("dev").unwrap().is_ok());
    }

    #[test]
    fn concurrent_appends_keep_chain_intact() {
        let log = Arc::new(log(20));
        let handles: Vec<_> = (0..6)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..15 {
                        log.append("shared", contract::sms(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = log.verify_chain("shared").unwrap();
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.length, 20);
    }

    #[test]
    fn reads_during_eviction_never_see_an_empty_queue() {
        let log = Arc::new(log(1));
        log.append("dev", contract::sms(0)).unwrap();

        let writer = {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 1..300 {
                    log.append("dev", contract::sms(i)).unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let forward = log.forward_from("dev", None, 10).unwrap();
            assert_eq!(forward.len(), 1);
            assert_eq!(log.backward_from("dev", None, 10).unwrap().len(), 1);
            assert!(log.latest("dev").unwrap().is_some());
            assert!(log.oldest("dev").unwrap().is_some());
        }
        writer.join().unwrap();

        let report = log.verify_chain("dev").unwrap();
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.length, 1);
    }
}
