//! Upstream LLM client.
//!
//! Speaks the OpenAI-compatible chat-completions protocol: streaming with
//! incremental tool-call assembly, a non-streaming completion path for the
//! title endpoint and non-streaming agents, and a connectivity probe for
//! health checks. Connection retry policy lives in [`retry`].

use serde::{Deserialize, Serialize};

use chatrelay_core::LlmMessage;

pub mod client;
pub mod retry;
pub mod sse;

pub use client::{ChatClient, Completion};
pub use retry::{connect_with_retry, RetryPolicy};

/// Provider-agnostic tool declaration sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// One upstream model call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    pub system: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<LlmMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            tools: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A streamed chunk from the upstream model.
#[derive(Debug, Clone, Default)]
pub struct CompletionChunk {
    /// Incremental assistant text.
    pub delta: Option<String>,
    /// A tool call the upstream has finalized.
    pub tool_use: Option<ToolUseChunk>,
    /// Upstream finish reason, sent at most once.
    pub stop_reason: Option<String>,
}

/// A finalized upstream tool call. `input_json` is the raw accumulated
/// argument document; parsing is the caller's concern.
#[derive(Debug, Clone)]
pub struct ToolUseChunk {
    pub id: String,
    pub name: String,
    pub input_json: String,
}

impl CompletionChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_use(tool_use: ToolUseChunk) -> Self {
        Self {
            tool_use: Some(tool_use),
            ..Default::default()
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            stop_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}
