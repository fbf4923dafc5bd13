//! HTTP route handlers.

pub mod chat;
pub mod health;
pub mod models;
pub mod title;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use chatrelay_core::Error;

/// Map a core error to an HTTP response. Only used before an SSE response
/// opens; after the first byte all failures are in-band events.
pub fn error_response(error: &Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error.to_response())).into_response()
}
