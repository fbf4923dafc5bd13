//! Authentication middleware.
//!
//! Three modes: `off`, `api-key` (X-API-Key header or bearer token
//! checked against the configured key list), and `jwt` (bearer token
//! validated with the configured secret). Health endpoints bypass auth so
//! liveness probes work unauthenticated. The JWT dependency is gated
//! behind the `jwt` cargo feature; selecting the mode without the feature
//! is rejected at startup.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, warn};

use chatrelay_core::config::{AuthMode, AuthSettings};
use chatrelay_core::{ErrorCode, ErrorResponse};

use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path().starts_with("/health") {
        return next.run(request).await;
    }

    let auth = &state.settings.auth;
    let authorized = match auth.mode {
        AuthMode::Off => true,
        AuthMode::ApiKey => validate_api_key(&request, auth),
        AuthMode::Jwt => validate_jwt(&request, auth),
    };

    if authorized {
        next.run(request).await
    } else {
        unauthorized()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            detail: "Invalid authentication credentials".into(),
            code: ErrorCode::AuthInvalid,
        }),
    )
        .into_response()
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn validate_api_key(request: &Request, auth: &AuthSettings) -> bool {
    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| bearer_token(request));

    let Some(presented) = presented else {
        debug!("no API key presented");
        return false;
    };

    for entry in &auth.api_keys {
        if entry.key == presented {
            debug!(key_name = %entry.name, "API key accepted");
            return true;
        }
    }
    warn!("invalid API key presented");
    false
}

#[cfg(feature = "jwt")]
fn validate_jwt(request: &Request, auth: &AuthSettings) -> bool {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let Some(token) = bearer_token(request) else {
        debug!("no bearer token presented");
        return false;
    };
    let Some(secret) = auth.jwt.secret.as_deref() else {
        warn!("jwt auth mode without a configured secret");
        return false;
    };

    let algorithm = match auth.jwt.algorithm.parse::<Algorithm>() {
        Ok(alg) => alg,
        Err(_) => {
            warn!(algorithm = %auth.jwt.algorithm, "unknown JWT algorithm");
            return false;
        }
    };

    let mut validation = Validation::new(algorithm);
    if let Some(issuer) = &auth.jwt.issuer {
        validation.set_issuer(&[issuer]);
    }
    if let Some(audience) = &auth.jwt.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    match decode::<serde_json::Value>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    ) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "JWT validation failed");
            false
        }
    }
}

#[cfg(not(feature = "jwt"))]
fn validate_jwt(_request: &Request, _auth: &AuthSettings) -> bool {
    // Startup validation rejects this configuration; never accept here.
    warn!("jwt auth mode selected but the 'jwt' feature is compiled out");
    false
}

/// Startup check: the configured mode must be usable in this build.
pub fn check_mode_supported(mode: AuthMode) -> chatrelay_core::Result<()> {
    if mode == AuthMode::Jwt && cfg!(not(feature = "jwt")) {
        return Err(chatrelay_core::Error::Config(
            "auth mode 'jwt' requires the 'jwt' cargo feature".into(),
        ));
    }
    Ok(())
}
