//! `POST /chat` — the streaming chat endpoint.
//!
//! Lifecycle: parse and validate the body, pick the agent path, convert
//! messages, construct the per-request agent, open the SSE response.
//! Failures up to that point surface as HTTP status codes; from the first
//! SSE byte on, everything is an in-band event.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tracing::info;

use chatrelay_agent::{ChatAgent, DEFAULT_SYSTEM_PROMPT};
use chatrelay_core::convert::convert_messages;
use chatrelay_core::{ChatRequest, Error, ErrorCode, ErrorResponse, StreamEvent};
use chatrelay_provider::RetryPolicy;

use crate::middleware::request_id::RequestId;
use crate::routes::error_response;
use crate::sse::{frame_events, sse_response};
use crate::state::AppState;

/// Strip a `provider/` prefix from a model id (`openai/gpt-4o` → `gpt-4o`).
fn extract_model_name(model_id: &str) -> &str {
    model_id
        .split_once('/')
        .map(|(_, name)| name)
        .unwrap_or(model_id)
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    if request.messages.is_empty() {
        return error_response(&Error::InvalidRequest(
            "messages array cannot be empty".into(),
        ));
    }
    if request.model.is_empty() {
        return error_response(&Error::InvalidRequest("model is required".into()));
    }

    // Agent dispatch: a named agent overrides prompt, tools, model, and
    // delivery mode; the client's tool whitelist is ignored.
    let descriptor = match request.agent.as_deref() {
        Some(name) => match state.agents.get(name) {
            Some(descriptor) => Some(descriptor.clone()),
            None => {
                // In-band error on an open stream, HTTP status stays 200.
                let message = state.agents.unknown_agent_message(name);
                info!(agent = %name, "unknown agent requested");
                return single_error_stream(&state, &request_id.0, message);
            }
        },
        None => None,
    };

    let llm_messages = match convert_messages(&request.messages) {
        Ok(messages) => messages,
        Err(e) => return error_response(&e),
    };

    let model_name = extract_model_name(&request.model).to_string();
    let retry = RetryPolicy::default().with_max_attempts(state.settings.upstream.max_retries);

    let agent = match descriptor {
        Some(descriptor) => {
            info!(agent = %descriptor.name, model = %model_name, "dispatching to named agent");
            ChatAgent::new(
                state.client.clone(),
                state.tools.clone(),
                descriptor.model.unwrap_or(model_name),
                descriptor.system_prompt,
                descriptor.tools,
                descriptor.streaming,
                retry,
            )
        }
        None => {
            let enabled_tools = request.tools.unwrap_or_default();
            info!(
                model = %model_name,
                tools = enabled_tools.len(),
                messages = request.messages.len(),
                "chat completion request"
            );
            ChatAgent::new(
                state.client.clone(),
                state.tools.clone(),
                model_name,
                DEFAULT_SYSTEM_PROMPT,
                enabled_tools,
                true,
                retry,
            )
        }
    };

    let cancel = state.shutdown.child_token();
    let events = agent.run(llm_messages, cancel.clone());
    let framed = frame_events(events, state.settings.stream_timeout(), cancel);
    sse_response(framed, &request_id.0)
}

/// Open the SSE response just to deliver one terminal error event.
fn single_error_stream(state: &AppState, request_id: &str, message: String) -> Response {
    let events = tokio_stream::iter(vec![StreamEvent::error(message)]);
    let cancel = state.shutdown.child_token();
    let framed = frame_events(events, state.settings.stream_timeout(), cancel);
    sse_response(framed, request_id)
}

fn rejection_response(rejection: JsonRejection) -> Response {
    let (status, code) = match &rejection {
        // Well-formed JSON that fails the schema.
        JsonRejection::JsonDataError(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ValidationError)
        }
        // Malformed JSON and everything else pre-schema.
        _ => (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest),
    };
    (
        status,
        Json(ErrorResponse {
            detail: rejection.body_text(),
            code,
        }),
    )
        .into_response()
}
