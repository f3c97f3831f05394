//! End-to-end relay scenarios over both log backings.

use smsrelay_core::{
    DocumentLog, LogConfig, LongPoll, MemoryLog, NewNotification, NotificationLog,
    NotificationRelay, RelayConfig,
};
use smsrelay_docstore::{DirDocumentStore, MemoryDocumentStore, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn sms(body: &str) -> NewNotification {
    NewNotification::new("+15550100", body, 1_700_000_000)
}

async fn wait_for_subscriber(relay: &NotificationRelay, device: &str) {
    while relay.broker().subscriber_count(device) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// maxLength = 2; append A, B, C; long-poll after C is woken by D.
async fn scenario(log: Arc<dyn NotificationLog>) {
    let relay = NotificationRelay::new(log, RelayConfig::default());

    relay.append("dev", sms("A")).unwrap();
    let b = relay.append("dev", sms("B")).unwrap();
    let c = relay.append("dev", sms("C")).unwrap();

    assert_eq!(relay.oldest("dev").unwrap(), Some(b.clone()));
    assert_eq!(relay.latest("dev").unwrap(), Some(c.clone()));
    assert_eq!(
        relay.fetch_new("dev", None, 10, LongPoll::Off).await.unwrap(),
        vec![b, c.clone()]
    );

    let waiter = {
        let relay = relay.clone();
        let cursor = c.id.clone();
        tokio::spawn(async move {
            relay
                .fetch_new("dev", Some(&cursor), 10, relay.long_poll(true))
                .await
        })
    };
    wait_for_subscriber(&relay, "dev").await;

    let d = relay.append("dev", sms("D")).unwrap();
    let woken = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(woken, vec![d]);
    assert!(relay.log().verify_chain("dev").unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_in_memory() {
    let log = MemoryLog::new(LogConfig::new().max_queue_length(2)).unwrap();
    scenario(Arc::new(log)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_over_documents() {
    let store = Arc::new(MemoryDocumentStore::in_memory());
    let log = DocumentLog::new(store, LogConfig::new().max_queue_length(2)).unwrap();
    scenario(Arc::new(log)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fan_out_reaches_every_waiter_once() {
    let log = MemoryLog::new(LogConfig::default()).unwrap();
    let relay = NotificationRelay::new(Arc::new(log), RelayConfig::default());
    let head = relay.append("dev", sms("seed")).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let relay = relay.clone();
            let cursor = head.id.clone();
            tokio::spawn(async move {
                relay
                    .fetch_new("dev", Some(&cursor), 10, LongPoll::Wait(Duration::from_secs(10)))
                    .await
            })
        })
        .collect();
    while relay.broker().subscriber_count("dev") < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let next = relay.append("dev", sms("next")).unwrap();
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap().unwrap(), vec![next.clone()]);
    }
}

#[tokio::test]
async fn document_log_survives_restart() {
    let dir = tempdir().unwrap();
    let config = LogConfig::new().max_queue_length(3);

    let sent: Vec<_> = {
        let store = Arc::new(DirDocumentStore::open_dir(dir.path(), StoreConfig::default()).unwrap());
        let log = DocumentLog::new(store, config.clone()).unwrap();
        (0..5)
            .map(|i| log.append("dev", sms(&format!("m{i}"))).unwrap())
            .collect()
    };

    let store = Arc::new(DirDocumentStore::open_dir(dir.path(), StoreConfig::default()).unwrap());
    let log = DocumentLog::new(store.clone(), config).unwrap();
    assert_eq!(log.forward_from("dev", None, 10).unwrap(), sent[2..].to_vec());
    assert!(log.verify_chain("dev").unwrap().is_ok());

    store.compact().unwrap();
    let next = log.append("dev", sms("after compaction")).unwrap();
    assert_eq!(log.latest("dev").unwrap(), Some(next));
    assert_eq!(log.queue_info("dev").unwrap().unwrap().length, 3);
}
