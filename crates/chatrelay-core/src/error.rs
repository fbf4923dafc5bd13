//! Error taxonomy shared across all chatrelay crates.
//!
//! Before an SSE response opens, errors surface as HTTP status codes with
//! a `{ detail, code }` JSON body. After the first byte, every failure
//! becomes a terminal in-band `error` event; the mapping helpers here
//! produce concise, non-sensitive user messages for both paths.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on user-visible error detail. Anything longer is truncated;
/// full context goes to the logs keyed by request id.
const MAX_DETAIL_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum Error {
    /// Request body failed JSON parsing or schema validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Message-conversion failure (bad turn structure, unknown part, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Missing or invalid client credentials.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Transient upstream failure: 429, 5xx, connection or I/O trouble.
    #[error("upstream transient failure: {message}")]
    UpstreamTransient {
        status: Option<u16>,
        message: String,
    },

    /// Non-retryable upstream failure (4xx other than 429).
    #[error("upstream error {status}: {message}")]
    UpstreamFatal { status: u16, message: String },

    /// A tool handler failed or its arguments did not validate.
    #[error("tool failure: {0}")]
    ToolFailure(String),

    /// Finalized tool-call arguments were not parseable as JSON.
    #[error("tool arguments not parseable: {0}")]
    ParseFailure(String),

    /// Wall-clock stream deadline exceeded.
    #[error("stream timeout")]
    Timeout,

    /// The request was cancelled (client disconnect or shutdown).
    #[error("request cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    ValidationError,
    AuthInvalid,
    RateLimited,
    ServiceUnavailable,
    ProviderError,
    ToolError,
    ParseError,
    Timeout,
    InternalError,
}

/// JSON body for HTTP error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: ErrorCode,
}

impl Error {
    /// Whether the retry policy may re-attempt the upstream connection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamTransient { .. })
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::InvalidMessage(_) => ErrorCode::ValidationError,
            Error::AuthFailure(_) => ErrorCode::AuthInvalid,
            Error::UpstreamTransient {
                status: Some(429), ..
            } => ErrorCode::RateLimited,
            Error::UpstreamTransient { .. } => ErrorCode::ServiceUnavailable,
            Error::UpstreamFatal { .. } => ErrorCode::ProviderError,
            Error::ToolFailure(_) => ErrorCode::ToolError,
            Error::ParseFailure(_) => ErrorCode::ParseError,
            Error::Timeout => ErrorCode::Timeout,
            Error::Cancelled | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// HTTP status for errors raised before the SSE response opens.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) | Error::InvalidMessage(_) => 422,
            Error::AuthFailure(_) => 401,
            Error::UpstreamTransient { .. } => 503,
            Error::UpstreamFatal { .. } => 502,
            _ => 500,
        }
    }

    /// Concise message safe to show to the client. Raw upstream bodies and
    /// internal context stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidRequest(detail) | Error::InvalidMessage(detail) => {
                truncate_detail(detail)
            }
            Error::AuthFailure(_) => "Invalid authentication credentials".into(),
            Error::UpstreamTransient {
                status: Some(429), ..
            } => "The service is experiencing high demand. Please try again in a moment.".into(),
            Error::UpstreamTransient { .. } => {
                "The model service is temporarily unavailable. Please try again later.".into()
            }
            Error::UpstreamFatal { .. } => {
                "The model provider returned an error. Please try again.".into()
            }
            Error::ToolFailure(detail) => truncate_detail(&format!("tool failure: {detail}")),
            Error::ParseFailure(_) => "The model produced malformed tool arguments".into(),
            Error::Timeout => "stream timeout".into(),
            _ => "An unexpected error occurred".into(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            detail: self.user_message(),
            code: self.code(),
        }
    }
}

fn truncate_detail(detail: &str) -> String {
    if detail.chars().count() <= MAX_DETAIL_LEN {
        return detail.to_string();
    }
    let cut: String = detail.chars().take(MAX_DETAIL_LEN - 3).collect();
    format!("{cut}...")
}
