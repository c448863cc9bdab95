//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    connections: usize,
    max_connections: usize,
    tracked_symbols: usize,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connections = state.registry.len();
    let max_connections = state.registry.config().max_connections;

    let status = if connections < max_connections {
        "healthy"
    } else {
        "saturated"
    };

    let response = HealthResponse {
        status: status.to_string(),
        connections,
        max_connections,
        tracked_symbols: state.engine.tracked_symbols().len(),
    };

    let code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
