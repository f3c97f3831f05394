//! Per-device subscription broker.
//!
//! A subscriber is one waiting long-poll request. It registers a single-slot
//! [`oneshot`] channel under its device; [`SubscriptionBroker::publish`]
//! removes every subscriber of the device and hands each its own copy of the
//! notification. Sending on a oneshot never blocks and spawns nothing, so a
//! subscriber that never reads cannot hold up the others or leak a task.
//!
//! The [`Subscription`] handle unregisters itself on drop, which covers both
//! an explicit unsubscribe and a caller that goes away mid-wait.

use crate::notification::Notification;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

type Waiters = HashMap<String, HashMap<u64, oneshot::Sender<Notification>>>;

#[derive(Debug, Default)]
struct BrokerInner {
    waiters: Mutex<Waiters>,
    next_id: AtomicU64,
}

impl BrokerInner {
    fn remove(&self, device_id: &str, subscriber_id: u64) -> bool {
        let mut waiters = self.waiters.lock();
        let Some(device) = waiters.get_mut(device_id) else {
            return false;
        };
        let removed = device.remove(&subscriber_id).is_some();
        if device.is_empty() {
            waiters.remove(device_id);
        }
        removed
    }
}

/// Fans new notifications out to waiting subscribers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionBroker {
    inner: Arc<BrokerInner>,
}

impl SubscriptionBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for the next notification of `device_id`.
    #[must_use]
    pub fn subscribe(&self, device_id: &str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        self.inner
            .waiters
            .lock()
            .entry(device_id.to_string())
            .or_default()
            .insert(id, sender);
        debug!(device_id, subscriber = id, "subscribed");

        Subscription {
            id,
            device_id: device_id.to_string(),
            receiver: Some(receiver),
            broker: Arc::clone(&self.inner),
        }
    }

    /// Removes a subscriber. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Delivers a copy of `notification` to every subscriber of `device_id`.
    ///
    /// Subscribers registered after the registry snapshot is taken are not
    /// included. Returns how many subscribers received it.
    pub fn publish(&self, device_id: &str, notification: &Notification) -> usize {
        let Some(targets) = self.inner.waiters.lock().remove(device_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (subscriber, sender) in targets {
            if sender.send(notification.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(device_id, subscriber, "subscriber went away before delivery");
            }
        }
        debug!(device_id, delivered, "published notification");
        delivered
    }

    /// Returns how many subscribers are waiting on `device_id`.
    #[must_use]
    pub fn subscriber_count(&self, device_id: &str) -> usize {
        self.inner
            .waiters
            .lock()
            .get(device_id)
            .map_or(0, HashMap::len)
    }
}

/// A registered subscriber.
///
/// Receives at most one notification. Dropping the handle unregisters it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    device_id: String,
    receiver: Option<oneshot::Receiver<Notification>>,
    broker: Arc<BrokerInner>,
}

impl Subscription {
    /// Returns the subscriber id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the device this subscriber waits on.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Waits for the delivery.
    ///
    /// Returns `None` if the broker was dropped without delivering.
    pub async fn recv(mut self) -> Option<Notification> {
        let receiver = self.receiver.take()?;
        receiver.await.ok()
    }

    /// Waits for the delivery for at most `timeout`.
    ///
    /// On timeout the subscriber is unregistered and `None` is returned.
    pub async fn recv_timeout(self, timeout: Duration) -> Option<Notification> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.broker.remove(&self.device_id, self.id) {
            debug!(device_id = %self.device_id, subscriber = self.id, "unsubscribed");
        }
    }
}
