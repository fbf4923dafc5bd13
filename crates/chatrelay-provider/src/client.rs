//! OpenAI-compatible chat-completions client.
//!
//! One [`ChatClient`] is shared across requests; the underlying
//! `reqwest::Client` pools connections. Cancellation is by drop: the
//! caller abandons the returned stream and the connection closes.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use chatrelay_core::config::UpstreamSettings;
use chatrelay_core::{Error, LlmMessage, Result};

use crate::sse::parse_sse_stream;
use crate::{CompletionChunk, CompletionRequest, ToolUseChunk};

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Budget for non-streaming calls. Streaming responses are bounded by
    /// the caller's wall-clock deadline instead.
    request_timeout: Duration,
}

/// Full (non-streaming) completion result.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolUseChunk>,
}

// --- wire types ---

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChunkChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct WireResponseChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunction,
}

#[derive(Debug, Deserialize)]
struct WireResponseFunction {
    name: String,
    arguments: String,
}

/// Accumulates one tool call across streaming deltas, keyed by index.
#[derive(Debug, Clone, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, settings: &UpstreamSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            request_timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn format_messages(request: &CompletionRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for message in &request.messages {
            match message {
                LlmMessage::System { text } => {
                    messages.push(json!({ "role": "system", "content": text }));
                }
                LlmMessage::User { text } => {
                    messages.push(json!({ "role": "user", "content": text }));
                }
                LlmMessage::Assistant { text, tool_calls } => {
                    let mut msg = json!({ "role": "assistant" });
                    if let Some(text) = text {
                        msg["content"] = json!(text);
                    }
                    if !tool_calls.is_empty() {
                        let calls: Vec<serde_json::Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.args.to_string(),
                                    }
                                })
                            })
                            .collect();
                        msg["tool_calls"] = json!(calls);
                    }
                    messages.push(msg);
                }
                LlmMessage::Tool { id, result, .. } => {
                    let content = match result {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": id,
                        "content": content,
                    }));
                }
            }
        }
        messages
    }

    fn format_tools(request: &CompletionRequest) -> Option<Vec<serde_json::Value>> {
        let tools = request.tools.as_ref()?;
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters_schema,
                        }
                    })
                })
                .collect(),
        )
    }

    fn wire_request(request: &CompletionRequest, stream: bool) -> WireRequest {
        WireRequest {
            model: request.model.clone(),
            messages: Self::format_messages(request),
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: Self::format_tools(request),
        }
    }

    async fn post_completions(
        &self,
        body: &WireRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }
        Ok(response)
    }

    /// Stream a chat completion as [`CompletionChunk`]s.
    pub async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<CompletionChunk>> + Send>>> {
        let body = Self::wire_request(request, true);
        debug!(model = %body.model, base_url = %self.base_url, "streaming chat completion");

        let response = self.post_completions(&body, None).await?;
        let sse = parse_sse_stream(response);

        struct State {
            sse: Pin<Box<dyn Stream<Item = Result<crate::sse::SseEvent>> + Send>>,
            calls: Vec<ToolCallAccumulator>,
            pending: VecDeque<CompletionChunk>,
            done: bool,
        }

        impl State {
            /// Move every accumulated tool call into the pending queue,
            /// then the stop reason if one was given.
            fn flush_calls(&mut self, stop_reason: Option<String>) {
                for acc in self.calls.drain(..) {
                    self.pending.push_back(CompletionChunk::tool_use(ToolUseChunk {
                        id: acc.id,
                        name: acc.name,
                        input_json: acc.arguments,
                    }));
                }
                if let Some(reason) = stop_reason {
                    self.pending.push_back(CompletionChunk::stop(reason));
                }
            }
        }

        let state = State {
            sse: Box::pin(sse),
            calls: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let chunks = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Some((Ok(chunk), state));
                }
                if state.done {
                    return None;
                }
                match state.sse.next().await {
                    Some(Ok(event)) => {
                        let data = event.data.trim();
                        if data == "[DONE]" {
                            state.flush_calls(None);
                            state.done = true;
                            continue;
                        }
                        let parsed: WireChunk = match serde_json::from_str(data) {
                            Ok(c) => c,
                            Err(e) => {
                                trace!(%e, data, "skipping unparseable upstream chunk");
                                continue;
                            }
                        };
                        let Some(choice) = parsed.choices.into_iter().next() else {
                            continue;
                        };

                        if let Some(deltas) = choice.delta.tool_calls {
                            for tc in deltas {
                                while state.calls.len() <= tc.index {
                                    state.calls.push(ToolCallAccumulator::default());
                                }
                                let acc = &mut state.calls[tc.index];
                                if let Some(id) = tc.id {
                                    acc.id = id;
                                }
                                if let Some(f) = tc.function {
                                    if let Some(name) = f.name {
                                        acc.name = name;
                                    }
                                    if let Some(args) = f.arguments {
                                        acc.arguments.push_str(&args);
                                    }
                                }
                            }
                        }

                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                state.pending.push_back(CompletionChunk::delta(content));
                            }
                        }

                        if let Some(reason) = choice.finish_reason {
                            if reason == "tool_calls" {
                                state.flush_calls(Some(reason));
                            } else {
                                state.pending.push_back(CompletionChunk::stop(reason));
                            }
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                    None => {
                        // Upstream closed without [DONE]; flush what we have.
                        state.flush_calls(None);
                        state.done = true;
                        continue;
                    }
                }
            }
        });

        Ok(Box::pin(chunks))
    }

    /// Run a chat completion to completion and return the full result.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = Self::wire_request(request, false);
        debug!(model = %body.model, base_url = %self.base_url, "non-streaming chat completion");

        let response = self
            .post_completions(&body, Some(self.request_timeout))
            .await?;
        let parsed: WireResponse = response.json().await.map_err(transport_error)?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(Error::UpstreamFatal {
                status: 200,
                message: "upstream response contained no choices".into(),
            });
        };

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolUseChunk {
                    id: tc.id,
                    name: tc.function.name,
                    input_json: tc.function.arguments,
                })
                .collect(),
        })
    }

    /// Lightweight connectivity probe: GET `/models`, returning latency.
    pub async fn probe(&self, timeout: Duration) -> Result<Duration> {
        let started = Instant::now();
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }
        Ok(started.elapsed())
    }
}

/// Map an upstream HTTP status to the error taxonomy: 429 and 5xx are
/// transient, everything else is fatal.
fn status_error(status: u16, body: String) -> Error {
    if status == 429 || status >= 500 {
        Error::UpstreamTransient {
            status: Some(status),
            message: body,
        }
    } else {
        Error::UpstreamFatal {
            status,
            message: body,
        }
    }
}

/// Network-level failures (connect, reset, DNS, I/O timeout) are transient.
fn transport_error(e: reqwest::Error) -> Error {
    Error::UpstreamTransient {
        status: None,
        message: e.to_string(),
    }
}
