//! HTTP routes.

use crate::error::ServerError;
use crate::handler::{FetchQuery, PostNotificationResponse, RequestHandler};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use smsrelay_core::Notification;
use tower_http::trace::TraceLayer;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    /// Request handler.
    pub handler: RequestHandler,
}

impl AppState {
    /// Creates the state.
    pub fn new(handler: RequestHandler) -> Self {
        Self { handler }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/:device_id/sms/notifications",
            get(fetch_notifications).post(post_notification),
        )
        .route(
            "/api/v1/:device_id/sms/notifications/previous",
            get(previous_notifications),
        )
        .route("/api/v1/:device_id/sms/notifications/oldest", get(oldest_notification))
        .route("/api/v1/:device_id/sms/notifications/latest", get(latest_notification))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn post_notification(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<Json<PostNotificationResponse>, ServerError> {
    state.handler.handle_post(&device_id, &body).await.map(Json)
}

async fn fetch_notifications(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    state.handler.handle_fetch(&device_id, &query).await.map(Json)
}

async fn previous_notifications(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    state.handler.handle_previous(&device_id, &query).await.map(Json)
}

async fn oldest_notification(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Notification>, ServerError> {
    state.handler.handle_oldest(&device_id).await.map(Json)
}

async fn latest_notification(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Notification>, ServerError> {
    state.handler.handle_latest(&device_id).await.map(Json)
}
