//! HTTP surface of the chatrelay streaming chat proxy.
//!
//! [`build_router`] assembles routes and middleware around an
//! [`AppState`]; [`serve`] is the composition root: settings → shared
//! HTTP client → upstream client → tool and agent registries → router,
//! then an axum server with graceful shutdown. There is no dependency
//! container; everything is wired explicitly here.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use chatrelay_agent::AgentRegistry;
use chatrelay_core::config::Settings;
use chatrelay_provider::ChatClient;
use chatrelay_tools::{register_builtin_tools, ToolRegistry};

pub mod middleware;
pub mod routes;
pub mod sse;
pub mod state;

pub use state::AppState;

/// Build the full application router for the given state.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);

    Router::new()
        .route("/chat", post(routes::chat::chat))
        .route("/title/generate", post(routes::title::generate_title))
        .route("/models", get(routes::models::list_models))
        .route("/health", get(routes::health::health))
        .route("/health/live", get(routes::health::live))
        .route("/health/ready", get(routes::health::ready))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        .layer(axum_middleware::from_fn(middleware::logging::log_requests))
        .layer(axum_middleware::from_fn(
            middleware::request_id::propagate_request_id,
        ))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .server
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Wire the application from settings and build its state.
pub fn build_state(settings: Settings) -> chatrelay_core::Result<AppState> {
    settings.validate()?;
    middleware::auth::check_mode_supported(settings.auth.mode)?;

    // One pooled HTTP client shared by every request and health probe.
    // No total timeout here: SSE bodies outlive any fixed budget, and the
    // framer enforces the wall-clock deadline. Non-streaming calls set
    // their own per-request timeout.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| chatrelay_core::Error::Config(format!("HTTP client: {e}")))?;

    let client = Arc::new(ChatClient::new(http, &settings.upstream));

    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);

    Ok(AppState {
        settings: Arc::new(settings),
        client,
        tools: Arc::new(tools),
        agents: Arc::new(AgentRegistry::builtin()),
        shutdown: CancellationToken::new(),
    })
}

/// Run the server until ctrl-c.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let state = build_state(settings)?;
    let addr = state.settings.bind_addr();
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chatrelay listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("shutdown signal received");
    // Cancels every in-flight request stream before the listener closes.
    shutdown.cancel();
}
