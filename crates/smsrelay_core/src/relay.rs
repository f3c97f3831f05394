//! Log plus broker: append-and-publish and long-poll fetches.

use crate::broker::SubscriptionBroker;
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::log::{NotificationLog, QueueInfo};
use crate::notification::{NewNotification, Notification, NotificationId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Whether a fetch may wait for new notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPoll {
    /// Return whatever is available right away.
    Off,
    /// If nothing is available, wait up to this long for the next one.
    Wait(Duration),
}

/// The relay service shared by all request handlers.
///
/// # Example
///
/// ```rust
/// use smsrelay_core::{LogConfig, LongPoll, MemoryLog, NewNotification, NotificationRelay, RelayConfig};
/// use std::sync::Arc;
///
/// # tokio_test_block(async {
/// let log = Arc::new(MemoryLog::new(LogConfig::default()).unwrap());
/// let relay = NotificationRelay::new(log, RelayConfig::default());
///
/// let sent = relay.append("phone", NewNotification::new("+1555", "hi", 1)).unwrap();
/// let fetched = relay.fetch_new("phone", None, 10, LongPoll::Off).await.unwrap();
/// assert_eq!(fetched, vec![sent]);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationRelay {
    log: Arc<dyn NotificationLog>,
    broker: SubscriptionBroker,
    config: RelayConfig,
}

impl NotificationRelay {
    /// Creates a relay over `log` with a fresh broker.
    pub fn new(log: Arc<dyn NotificationLog>, config: RelayConfig) -> Self {
        Self {
            log,
            broker: SubscriptionBroker::new(),
            config,
        }
    }

    /// Returns the underlying log.
    #[must_use]
    pub fn log(&self) -> &Arc<dyn NotificationLog> {
        &self.log
    }

    /// Returns the broker.
    #[must_use]
    pub fn broker(&self) -> &SubscriptionBroker {
        &self.broker
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Maps a client's long-polling flag to a [`LongPoll`] using the
    /// configured timeout.
    #[must_use]
    pub fn long_poll(&self, enabled: bool) -> LongPoll {
        if enabled {
            LongPoll::Wait(self.config.long_poll_timeout)
        } else {
            LongPoll::Off
        }
    }

    /// Appends to the log, then wakes the device's waiting subscribers.
    ///
    /// # Errors
    ///
    /// Returns the log's error; nothing is published then.
    pub fn append(&self, device_id: &str, new: NewNotification) -> RelayResult<Notification> {
        let notification = self.log.append(device_id, new)?;
        self.broker.publish(device_id, &notification);
        Ok(notification)
    }

    /// Fetches notifications newer than `start`, waiting if allowed.
    ///
    /// If the log has anything after `start`, up to `limit` entries are
    /// returned immediately. Otherwise, with [`LongPoll::Wait`], the call
    /// subscribes, checks the log once more to close the gap before the
    /// subscription existed, and then waits for the next append. A delivery
    /// yields a one-element result; a timeout yields an empty one.
    ///
    /// # Errors
    ///
    /// Returns the log's error.
    pub async fn fetch_new(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
        long_poll: LongPoll,
    ) -> RelayResult<Vec<Notification>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let ready = self.log.forward_from(device_id, start, limit)?;
        let timeout = match long_poll {
            LongPoll::Wait(timeout) if ready.is_empty() => timeout,
            _ => return Ok(ready),
        };

        let subscription = self.broker.subscribe(device_id);
        let ready = self.log.forward_from(device_id, start, limit)?;
        if !ready.is_empty() {
            return Ok(ready);
        }

        debug!(device_id, subscriber = subscription.id(), ?timeout, "long-poll waiting");
        match subscription.recv_timeout(timeout).await {
            Some(notification) => Ok(vec![notification]),
            None => {
                debug!(device_id, "long-poll timed out");
                Ok(Vec::new())
            }
        }
    }

    /// Fetches notifications older than `start`, newest first.
    ///
    /// # Errors
    ///
    /// Returns the log's error.
    pub fn fetch_previous(
        &self,
        device_id: &str,
        start: Option<&NotificationId>,
        limit: usize,
    ) -> RelayResult<Vec<Notification>> {
        self.log.backward_from(device_id, start, limit)
    }

    /// Returns the device's oldest notification.
    ///
    /// # Errors
    ///
    /// Returns the log's error.
    pub fn oldest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        self.log.oldest(device_id)
    }

    /// Returns the device's newest notification.
    ///
    /// # Errors
    ///
    /// Returns the log's error.
    pub fn latest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
        self.log.latest(device_id)
    }

    /// Returns the device's queue metadata.
    ///
    /// # Errors
    ///
    /// Returns the log's error.
    pub fn queue_info(&self, device_id: &str) -> RelayResult<Option<QueueInfo>> {
        self.log.queue_info(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::log::{ChainSnapshot, MemoryLog};

    fn relay(max: u64) -> NotificationRelay {
        let log = MemoryLog::new(LogConfig::new().max_queue_length(max)).unwrap();
        NotificationRelay::new(Arc::new(log), RelayConfig::default())
    }

    fn sms(i: i64) -> NewNotification {
        NewNotification::new("+1555", format!("m{i}"), i)
    }

    #[tokio::test]
    async fn backlog_returns_without_waiting() {
        let relay = relay(10);
        let a = relay.append("dev", sms(1)).unwrap();
        let b = relay.append("dev", sms(2)).unwrap();

        let wait = LongPoll::Wait(Duration::from_secs(60));
        let got = relay.fetch_new("dev", None, 10, wait).await.unwrap();
        assert_eq!(got, vec![a.clone(), b.clone()]);

        let got = relay.fetch_new("dev", Some(&a.id), 10, wait).await.unwrap();
        assert_eq!(got, vec![b]);
    }

    #[tokio::test]
    async fn no_long_poll_returns_empty_immediately() {
        let relay = relay(10);
        let got = relay.fetch_new("dev", None, 10, LongPoll::Off).await.unwrap();
        assert!(got.is_empty());
        assert_eq!(relay.broker().subscriber_count("dev"), 0);
    }

    #[tokio::test]
    async fn waiter_is_woken_by_append() {
        let relay = relay(2);
        relay.append("dev", sms(1)).unwrap();
        let c = relay.append("dev", sms(2)).unwrap();

        let waiter = {
            let relay = relay.clone();
            let cursor = c.id.clone();
            tokio::spawn(async move {
                relay
                    .fetch_new("dev", Some(&cursor), 10, LongPoll::Wait(Duration::from_secs(10)))
                    .await
            })
        };

        while relay.broker().subscriber_count("dev") == 0 {
            tokio::task::yield_now().await;
        }
        let d = relay.append("dev", sms(3)).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), vec![d]);
        assert_eq!(relay.broker().subscriber_count("dev"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_empty_and_unsubscribes() {
        let relay = relay(10);
        let got = relay
            .fetch_new("dev", None, 10, LongPoll::Wait(Duration::from_secs(30)))
            .await
            .unwrap();
        assert!(got.is_empty());
        assert_eq!(relay.broker().subscriber_count("dev"), 0);
    }

    #[tokio::test]
    async fn cancelled_wait_unsubscribes() {
        let relay = relay(10);
        let pending = {
            let relay = relay.clone();
            tokio::spawn(async move {
                relay
                    .fetch_new("dev", None, 10, LongPoll::Wait(Duration::from_secs(60)))
                    .await
            })
        };
        while relay.broker().subscriber_count("dev") == 0 {
            tokio::task::yield_now().await;
        }

        pending.abort();
        let _ = pending.await;
        assert_eq!(relay.broker().subscriber_count("dev"), 0);
    }

    #[tokio::test]
    async fn zero_limit_never_waits() {
        let relay = relay(10);
        let got = relay
            .fetch_new("dev", None, 0, LongPoll::Wait(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn long_poll_flag_uses_configured_timeout() {
        let relay = relay(1);
        assert_eq!(relay.long_poll(false), LongPoll::Off);
        assert_eq!(
            relay.long_poll(true),
            LongPoll::Wait(RelayConfig::default().long_poll_timeout)
        );
    }

    /// Lands an append straight in the inner log, bypassing the broker,
    /// right after the first `forward_from` call.
    struct AppendAfterFirstRead {
        inner: MemoryLog,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl NotificationLog for AppendAfterFirstRead {
        fn append(&self, device_id: &str, new: NewNotification) -> RelayResult<Notification> {
            self.inner.append(device_id, new)
        }

        fn forward_from(
            &self,
            device_id: &str,
            start: Option<&NotificationId>,
            limit: usize,
        ) -> RelayResult<Vec<Notification>> {
            let found = self.inner.forward_from(device_id, start, limit)?;
            if self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                self.inner.append(device_id, sms(7))?;
            }
            Ok(found)
        }

        fn backward_from(
            &self,
            device_id: &str,
            start: Option<&NotificationId>,
            limit: usize,
        ) -> RelayResult<Vec<Notification>> {
            self.inner.backward_from(device_id, start, limit)
        }

        fn oldest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
            self.inner.oldest(device_id)
        }

        fn latest(&self, device_id: &str) -> RelayResult<Option<Notification>> {
            self.inner.latest(device_id)
        }

        fn queue_info(&self, device_id: &str) -> RelayResult<Option<QueueInfo>> {
            self.inner.queue_info(device_id)
        }

        fn devices(&self) -> RelayResult<Vec<String>> {
            self.inner.devices()
        }

        fn chain_snapshot(&self, device_id: &str) -> RelayResult<Option<ChainSnapshot>> {
            self.inner.chain_snapshot(device_id)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn append_between_check_and_subscribe_is_not_lost() {
        let log = AppendAfterFirstRead {
            inner: MemoryLog::new(LogConfig::new().max_queue_length(10)).unwrap(),
            reads: std::sync::atomic::AtomicUsize::new(0),
        };
        let relay = NotificationRelay::new(Arc::new(log), RelayConfig::default());

        let got = relay
            .fetch_new("dev", None, 10, LongPoll::Wait(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].data, "m7");
        assert_eq!(relay.broker().subscriber_count("dev"), 0);
    }
}
