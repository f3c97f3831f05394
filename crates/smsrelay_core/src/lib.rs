//! # smsrelay core
//!
//! Per-device notification log with bounded retention and live fan-out.
//!
//! This crate provides:
//! - [`NotificationLog`] with an in-process ([`MemoryLog`]) and a
//!   document-store ([`DocumentLog`]) backing
//! - [`SubscriptionBroker`] for handing new notifications to waiting requests
//! - [`NotificationRelay`], which composes both into append-and-publish and
//!   long-poll fetches
//! - Chain verification ([`ChainReport`]) for maintenance tooling
//!
//! ## Queue model
//!
//! Every device owns a queue whose entries are linked by id in both
//! directions. `first` is the newest entry, `last` the oldest. Nodes hold
//! neighbor ids only, so both backings share one shape: an id-indexed arena.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
pub mod documents;
mod error;
mod log;
mod notification;
mod relay;
mod verify;

pub use broker::{Subscription, SubscriptionBroker};
pub use config::{LogConfig, RelayConfig, DEFAULT_LONG_POLL_TIMEOUT, DEFAULT_MAX_QUEUE_LENGTH};
pub use error::{RelayError, RelayResult};
pub use log::{ChainSnapshot, DocumentLog, MemoryLog, NodeLinks, NotificationLog, QueueInfo};
pub use notification::{NewNotification, Notification, NotificationId};
pub use relay::{LongPoll, NotificationRelay};
pub use verify::{check_chain, ChainReport, ChainViolation};
