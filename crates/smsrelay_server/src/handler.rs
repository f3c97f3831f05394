//! Request handlers for the notification endpoints.
//!
//! Handlers take already-extracted request parts and know nothing about the
//! HTTP framework; the router maps routes onto them.

use crate::config::ServerConfig;
use crate::error::{
    ServerError, ServerResult, FETCH_COUNT_PARSE_FAILURE, LONG_POLLING_PARSE_FAILURE,
};
use serde::{Deserialize, Serialize};
use smsrelay_core::{NewNotification, Notification, NotificationId, NotificationRelay, RelayResult};
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Relay shared by all requests.
    pub relay: NotificationRelay,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, relay: NotificationRelay) -> Self {
        Self { config, relay }
    }
}

/// Raw query string of the fetch endpoints. Values are validated by the
/// handler so that parse failures map to stable reason codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchQuery {
    /// Cursor; only notifications past it are returned.
    pub starting_uuid: Option<String>,
    /// Maximum number of notifications.
    pub fetch_count: Option<String>,
    /// Whether to wait when nothing is available.
    pub long_polling: Option<String>,
}

/// Validated fetch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    /// Cursor, if any.
    pub start: Option<NotificationId>,
    /// Number of notifications, already clamped.
    pub fetch_count: usize,
    /// Whether to wait when nothing is available.
    pub long_polling: bool,
}

/// Body of a notification upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostNotificationRequest {
    /// Sender or recipient address.
    pub address: String,
    /// Message body.
    pub body: String,
    /// Device-side timestamp.
    pub timestamp: i64,
}

impl From<PostNotificationRequest> for NewNotification {
    fn from(request: PostNotificationRequest) -> Self {
        NewNotification::new(request.address, request.body, request.timestamp)
    }
}

/// Reply to a notification upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostNotificationResponse {
    /// Always `"success"`.
    pub status: String,
    /// Id assigned to the notification.
    pub id: NotificationId,
}

/// Handler for notification requests.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the handler context.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// Validates a fetch query. `long_polling` is checked before
    /// `fetch_count`, so a request with both wrong reports the former.
    ///
    /// With [`ServerConfig::require_query_params`] set, a missing value is
    /// a parse failure; otherwise it falls back to `false` and
    /// [`ServerConfig::default_fetch_count`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidQuery`] with the reason code of the
    /// first parameter that does not parse.
    pub fn parse_fetch_query(&self, query: &FetchQuery) -> ServerResult<FetchParams> {
        let config = &self.context.config;
        let missing = |reason| {
            if config.require_query_params {
                Err(ServerError::InvalidQuery { reason })
            } else {
                Ok(())
            }
        };

        let long_polling = match query.long_polling.as_deref() {
            None => missing(LONG_POLLING_PARSE_FAILURE).map(|()| false)?,
            Some(raw) => parse_bool(raw).ok_or(ServerError::InvalidQuery {
                reason: LONG_POLLING_PARSE_FAILURE,
            })?,
        };

        let fetch_count = match query.fetch_count.as_deref() {
            None => missing(FETCH_COUNT_PARSE_FAILURE).map(|()| config.default_fetch_count)?,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ServerError::InvalidQuery {
                    reason: FETCH_COUNT_PARSE_FAILURE,
                })?,
        };

        Ok(FetchParams {
            start: query.starting_uuid.as_deref().and_then(NotificationId::cursor),
            fetch_count: fetch_count.min(config.max_fetch_count),
            long_polling,
        })
    }

    /// Runs a log call on the blocking pool; a directory-backed append
    /// fsyncs before it returns.
    async fn blocking<T, F>(&self, device_id: &str, call: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&NotificationRelay, &str) -> RelayResult<T> + Send + 'static,
    {
        let relay = self.context.relay.clone();
        let device_id = device_id.to_string();
        let result = tokio::task::spawn_blocking(move || call(&relay, &device_id))
            .await
            .map_err(|e| ServerError::Blocking(format!("spawn_blocking failed: {e}")))?;
        Ok(result?)
    }

    /// Handles a notification upload.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequestBody`] if `body` is not a valid
    /// upload, or the relay's error.
    pub async fn handle_post(&self, device_id: &str, body: &[u8]) -> ServerResult<PostNotificationResponse> {
        let request: PostNotificationRequest = serde_json::from_slice(body)
            .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;

        let new = NewNotification::from(request);
        let stored = self
            .blocking(device_id, move |relay, device_id| relay.append(device_id, new))
            .await?;
        debug!(device_id, id = %stored.id, "notification stored");

        Ok(PostNotificationResponse {
            status: "success".to_string(),
            id: stored.id,
        })
    }

    /// Handles a fetch of newer notifications, long-polling if asked to.
    ///
    /// # Errors
    ///
    /// Returns a query validation error or the relay's error.
    pub async fn handle_fetch(&self, device_id: &str, query: &FetchQuery) -> ServerResult<Vec<Notification>> {
        let params = self.parse_fetch_query(query)?;
        let relay = &self.context.relay;
        let long_poll = relay.long_poll(params.long_polling);

        Ok(relay
            .fetch_new(device_id, params.start.as_ref(), params.fetch_count, long_poll)
            .await?)
    }

    /// Handles a fetch of older notifications, newest first.
    ///
    /// `long_polling` is validated like on the forward fetch but never waits.
    ///
    /// # Errors
    ///
    /// Returns a query validation error or the relay's error.
    pub async fn handle_previous(&self, device_id: &str, query: &FetchQuery) -> ServerResult<Vec<Notification>> {
        let params = self.parse_fetch_query(query)?;
        self.blocking(device_id, move |relay, device_id| {
            relay.fetch_previous(device_id, params.start.as_ref(), params.fetch_count)
        })
        .await
    }

    /// Handles a request for the oldest notification.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoNotifications`] for an empty device.
    pub async fn handle_oldest(&self, device_id: &str) -> ServerResult<Notification> {
        self.blocking(device_id, |relay, device_id| relay.oldest(device_id))
            .await?
            .ok_or(ServerError::NoNotifications)
    }

    /// Handles a request for the newest notification.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoNotifications`] for an empty device.
    pub async fn handle_latest(&self, device_id: &str) -> ServerResult<Notification> {
        self.blocking(device_id, |relay, device_id| relay.latest(device_id))
            .await?
            .ok_or(ServerError::NoNotifications)
    }
}

/// Accepts the spellings `1 t T TRUE true True 0 f F FALSE false False`.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
