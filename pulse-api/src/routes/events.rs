//! Producer event ingestion
//!
//! Upstream analysis services (content pipeline, scorers, news feeds) push
//! their events here; each one is queued on the event hub and flows through
//! the engine and dispatcher asynchronously.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use tracing::debug;

use pulse_core::AnalysisEvent;

use crate::AppState;

/// Accept one analysis event for asynchronous processing
async fn ingest(State(state): State<AppState>, Json(event): Json<AnalysisEvent>) -> StatusCode {
    debug!("Ingesting {} event", event.topic());
    state.publisher.publish(event);
    StatusCode::ACCEPTED
}

/// Create event ingestion routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(ingest))
}
