pub mod events;
pub mod health;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use calmerge_core::CalMergeError;
use serde::Serialize;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(events::router())
        .merge(health::router())
        .with_state(state)
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert anyhow errors to HTTP responses
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<CalMergeError>() {
            Some(CalMergeError::ConfigNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
