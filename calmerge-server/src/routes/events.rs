//! Merged event list endpoint

use axum::{Json, Router, extract::State, routing::get};
use calmerge_core::AggregatedResult;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(list_events))
}

/// GET /api/events - All feeds, expanded and merged
async fn list_events(State(state): State<AppState>) -> Result<Json<AggregatedResult>, AppError> {
    let config = state.feed_config()?;
    let result = state.aggregator().run(&config.calendars).await;
    Ok(Json(result))
}
