//! `POST /title/generate` — short non-streaming sibling of the chat path.
//!
//! Degrades gracefully: any generation error or timeout yields an empty
//! title with `useFallback: true` and HTTP 200. Only request validation
//! failures produce an error status.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use chatrelay_core::title::clean_title;
use chatrelay_core::{Error, LlmMessage};
use chatrelay_provider::CompletionRequest;

use crate::routes::error_response;
use crate::state::AppState;

const TITLE_PROMPT: &str = "\
Generate a concise title (max {max_length} characters) for this conversation based on the user's first message.
The title should:
- Capture the main topic or intent
- Be descriptive but brief
- Not include quotes or special characters
- Be in sentence case

User message: {user_message}

Respond with ONLY the title, nothing else.";

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    #[serde(rename = "userMessage")]
    pub user_message: String,
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub title: String,
    #[serde(rename = "useFallback")]
    pub use_fallback: bool,
}

fn fallback() -> Json<TitleResponse> {
    Json(TitleResponse {
        title: String::new(),
        use_fallback: true,
    })
}

pub async fn generate_title(
    State(state): State<AppState>,
    Json(request): Json<TitleRequest>,
) -> Response {
    if request.user_message.is_empty() {
        return error_response(&Error::InvalidRequest("userMessage cannot be empty".into()));
    }
    if request.conversation_id.is_empty() {
        return error_response(&Error::InvalidRequest(
            "conversationId cannot be empty".into(),
        ));
    }

    let settings = &state.settings.title;
    let prompt = TITLE_PROMPT
        .replace("{max_length}", &settings.max_length.to_string())
        .replace("{user_message}", &request.user_message);

    debug!(
        conversation_id = %request.conversation_id,
        model = %settings.model,
        timeout_ms = settings.timeout_ms,
        "generating title"
    );

    let completion_request =
        CompletionRequest::new(settings.model.clone(), vec![LlmMessage::user(prompt)]);

    let outcome = tokio::time::timeout(
        state.settings.title_timeout(),
        state.client.complete(&completion_request),
    )
    .await;

    match outcome {
        Ok(Ok(completion)) => {
            let title = clean_title(&completion.text, settings.max_length);
            info!(conversation_id = %request.conversation_id, title = %title, "title generated");
            Json(TitleResponse {
                title,
                use_fallback: false,
            })
            .into_response()
        }
        Ok(Err(e)) => {
            warn!(conversation_id = %request.conversation_id, error = %e, "title generation failed");
            fallback().into_response()
        }
        Err(_) => {
            warn!(conversation_id = %request.conversation_id, "title generation timed out");
            fallback().into_response()
        }
    }
}
