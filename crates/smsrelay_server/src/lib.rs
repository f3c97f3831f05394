//! # smsrelay server
//!
//! HTTP surface of the notification relay.
//!
//! This crate provides:
//! - Notification upload, fetch, backward paging, oldest and latest routes
//! - Long-poll fetches that wait for the device's next notification
//! - Transport-agnostic request handlers ([`RequestHandler`])
//! - Server configuration from builders or `SMSRELAY_*` variables
//!
//! # Routes
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | `POST` | `/api/v1/:device_id/sms/notifications` | `{"status":"success","id":..}` |
//! | `GET` | `/api/v1/:device_id/sms/notifications` | newer notifications, oldest first |
//! | `GET` | `/api/v1/:device_id/sms/notifications/previous` | older notifications, newest first |
//! | `GET` | `/api/v1/:device_id/sms/notifications/oldest` | one notification or 404 |
//! | `GET` | `/api/v1/:device_id/sms/notifications/latest` | one notification or 404 |
//! | `GET` | `/health` | `{"status":"ok"}` |
//!
//! Errors are returned as `{"error_code": .., "reason": ..}`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod http;
mod server;

pub use config::{
    ServerConfig, StorageBackend, ENV_BIND, ENV_DATA_DIR, ENV_DEFAULT_FETCH_COUNT,
    ENV_LONG_POLL_SECS, ENV_MAX_FETCH_COUNT, ENV_MAX_QUEUE_LENGTH, ENV_REQUIRE_QUERY_PARAMS,
};
pub use error::{
    ErrorBody, ServerError, ServerResult, FETCH_COUNT_PARSE_FAILURE, LONG_POLLING_PARSE_FAILURE,
};
pub use handler::{
    FetchParams, FetchQuery, HandlerContext, PostNotificationRequest, PostNotificationResponse,
    RequestHandler,
};
pub use http::{build_router, AppState};
pub use server::RelayServer;
