//! Administrative endpoints
//!
//! Operator surface: force-disconnect a client, broadcast a notice to every
//! connection, and read aggregate gateway statistics. Authentication is
//! handled upstream of this service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use pulse_core::Priority;
use pulse_services::{ConnectionId, RegistryStats};

use crate::AppState;

#[derive(Debug, Deserialize)]
struct DisconnectRequest {
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_reason() -> String {
    "admin_disconnect".to_string()
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    message: String,
    #[serde(default)]
    priority: Priority,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    registry: RegistryStats,
    tracked_symbols: usize,
}

/// Force-disconnect one connection, with a terminal notice to the client
async fn force_disconnect(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DisconnectRequest>,
) -> StatusCode {
    info!("Admin disconnect requested for conn-{}: {}", id, request.reason);
    match state
        .registry
        .force_disconnect(ConnectionId(id), &request.reason)
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::NOT_FOUND,
    }
}

/// Broadcast an admin message to every live connection
async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> StatusCode {
    info!("Admin broadcast to {} connection(s)", state.registry.len());
    state
        .dispatcher
        .admin_broadcast(request.message, request.priority)
        .await;
    StatusCode::ACCEPTED
}

/// Aggregate gateway statistics
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        registry: state.registry.stats(),
        tracked_symbols: state.engine.tracked_symbols().len(),
    })
}

/// Create admin routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/connections/{id}/disconnect", post(force_disconnect))
        .route("/admin/broadcast", post(broadcast))
        .route("/stats", get(stats))
}
