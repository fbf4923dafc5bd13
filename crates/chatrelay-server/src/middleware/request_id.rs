//! `X-Request-ID` propagation.
//!
//! A valid UUID supplied by the client is accepted and echoed back;
//! anything else is replaced by a fresh one. The id rides in request
//! extensions for handlers and the logging middleware.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id, available via request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn extract_or_generate(header: Option<&HeaderValue>) -> String {
    header
        .and_then(|v| v.to_str().ok())
        .filter(|v| Uuid::parse_str(v).is_ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let id = extract_or_generate(request.headers().get(REQUEST_ID_HEADER));
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    // SSE responses set the header themselves; don't overwrite.
    if !response.headers().contains_key(REQUEST_ID_HEADER) {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }
    response
}
