//! HTTP and WebSocket handlers for the commentcast server.
//!
//! - `GET /ws?post_id=<room>` upgrades to a WebSocket subscribed to one room.
//!   The subscriber identity comes from a header set by the auth proxy.
//! - `POST /rooms/:room/events` lets out-of-process producers emit events.
//! - `GET /health` reports liveness and registry stats.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use commentcast_core::{validate_room_key, Event, EventKind, HubError, HubHandle, SubscriberId};
use futures_util::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Handle to the running hub.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Config,
}

/// Request errors, each mapped to a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("post_id is required")]
    MissingRoom,

    #[error("invalid room: {0}")]
    InvalidRoom(&'static str),

    #[error("subscriber identity is required")]
    MissingIdentity,

    #[error("event rejected: {0}")]
    Rejected(#[source] commentcast_protocol::ProtocolError),

    #[error("hub is shutting down")]
    Unavailable,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingRoom | Self::InvalidRoom(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::Encode(e) => Self::Rejected(e),
            HubError::Shutdown => Self::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/rooms/:room/events", post(publish_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server<F>(config: Config, hub: HubHandle, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve(listener, config, hub, shutdown).await
}

/// Serve on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(
    listener: TcpListener,
    config: Config,
    hub: HubHandle,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("commentcast listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    let state = Arc::new(AppState { hub, config });
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    let status = if state.hub.is_running() { "ok" } else { "shutting_down" };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "connections": stats.connection_count,
    }))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    post_id: Option<String>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (room, subscriber) = authorize(&state.config, query, &headers).map_err(|e| {
        debug!(error = %e, "Handshake rejected");
        metrics::record_rejected_handshake(match &e {
            ApiError::MissingIdentity => "missing_identity",
            _ => "invalid_room",
        });
        e
    })?;

    Ok(ws
        .max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, room, subscriber)))
}

fn authorize(
    config: &Config,
    query: WsQuery,
    headers: &HeaderMap,
) -> Result<(String, SubscriberId), ApiError> {
    let room = query
        .post_id
        .filter(|room| !room.is_empty())
        .ok_or(ApiError::MissingRoom)?;
    validate_room_key(&room).map_err(ApiError::InvalidRoom)?;

    let subscriber = headers
        .get(config.transport.identity_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingIdentity)?;

    Ok((room, SubscriberId::new(subscriber)))
}

/// Handle an upgraded WebSocket until either side closes it.
async fn handle_websocket(
    socket: WebSocket,
    state: Arc<AppState>,
    room: String,
    subscriber: SubscriberId,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (handle, mailbox) = state.hub.open(room, subscriber);
    let id = handle.id();
    debug!(
        connection = %id,
        room = %handle.room(),
        subscriber = %handle.subscriber(),
        "WebSocket connected"
    );

    let (sink, stream) = socket.split();
    let final_state = commentcast_transport::serve(
        state.hub.clone(),
        handle,
        mailbox,
        sink,
        stream,
        state.config.pump_config(),
    )
    .await;

    debug!(connection = %id, state = ?final_state, "WebSocket disconnected");
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Producer ingress: broadcast one event to a room.
async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_room_key(&room).map_err(ApiError::InvalidRoom)?;

    let event = Event::new(request.kind, room, request.payload);
    let report = state.hub.broadcast(&event).await.map_err(|e| {
        warn!(room = %event.room(), kind = %event.kind(), error = %e, "Publish failed");
        ApiError::from(e)
    })?;

    debug!(
        room = %event.room(),
        kind = %event.kind(),
        delivered = report.delivered,
        evicted = report.evicted,
        "Published"
    );
    Ok((StatusCode::ACCEPTED, Json(report)))
}
