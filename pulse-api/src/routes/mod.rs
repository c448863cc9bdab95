//! API route definitions

mod admin;
mod events;
mod health;
mod trends;
pub mod ws;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(admin::routes())
        .merge(events::routes())
        .merge(trends::routes())
}

/// Create WebSocket and health routes (served outside the /api prefix)
pub fn ws_routes() -> Router<AppState> {
    Router::new().merge(ws::routes()).merge(health::routes())
}
