//! On-demand trend reports

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use pulse_core::TrendReport;
use pulse_services::Horizon;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
struct TrendQuery {
    /// Restrict the report to one symbol; omitted means market-wide
    symbol: Option<String>,
    #[serde(default)]
    horizon: Horizon,
}

/// Run (or serve from cache) a detection pass
async fn trend_report(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Json<TrendReport> {
    let report = state
        .engine
        .detect_trends(query.symbol.as_deref(), query.horizon);
    Json(report)
}

/// Create trend routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/trends", get(trend_report))
}
