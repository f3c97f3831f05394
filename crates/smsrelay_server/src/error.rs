//! Error types for the relay server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use smsrelay_core::RelayError;
use smsrelay_docstore::DocStoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// `long_polling` is not a boolean.
pub const LONG_POLLING_PARSE_FAILURE: &str = "LongPollingQueryParamParseFailure";
/// `fetch_count` is not a non-negative integer.
pub const FETCH_COUNT_PARSE_FAILURE: &str = "FetchCountQueryParamParseFailure";

/// Errors that can occur in the relay server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A query parameter did not parse.
    #[error("invalid query parameter: {reason}")]
    InvalidQuery {
        /// Machine-readable reason code.
        reason: &'static str,
    },

    /// The request body is not a valid notification.
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),

    /// The device has no notifications.
    #[error("no notifications for device")]
    NoNotifications,

    /// The relay failed.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Opening the document store failed.
    #[error("document store error: {0}")]
    Store(#[from] DocStoreError),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking log call panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidQuery { .. }
                | ServerError::InvalidRequestBody(_)
                | ServerError::NoNotifications
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidQuery { .. } | ServerError::InvalidRequestBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::NoNotifications => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error category sent as `error_code`.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::InvalidQuery { .. } | ServerError::InvalidRequestBody(_) => "BadRequest",
            ServerError::NoNotifications => "NotFound",
            _ => "InternalServerError",
        }
    }

    /// Stable machine-readable reason sent as `reason`.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ServerError::InvalidQuery { reason } => *reason,
            ServerError::InvalidRequestBody(_) => "InvalidRequestBody",
            ServerError::NoNotifications => "NoNotifications",
            _ => "InternalServerError",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error category.
    pub error_code: String,
    /// Reason code.
    pub reason: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorBody {
            error_code: self.error_code().to_string(),
            reason: self.reason_code().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        let bad = ServerError::InvalidQuery {
            reason: FETCH_COUNT_PARSE_FAILURE,
        };
        assert!(bad.is_client_error());
        assert!(!bad.is_server_error());
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.reason_code(), FETCH_COUNT_PARSE_FAILURE);

        assert_eq!(ServerError::NoNotifications.status_code(), StatusCode::NOT_FOUND);

        let broken = ServerError::Relay(RelayError::corrupted("queue points nowhere"));
        assert!(broken.is_server_error());
        assert_eq!(broken.error_code(), "InternalServerError");

        let lost = ServerError::Blocking("task panicked".into());
        assert!(lost.is_server_error());
        assert_eq!(lost.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let err = ServerError::Relay(RelayError::corrupted("secret path /var/x"));
        assert_eq!(err.reason_code(), "InternalServerError");
        assert!(err.to_string().contains("/var/x"));
    }

    #[test]
    fn response_carries_status() {
        let response = ServerError::InvalidRequestBody("eof".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
