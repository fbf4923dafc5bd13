//! Per-request agent: runs one upstream model call and projects its
//! events onto the output taxonomy.
//!
//! The projection runs on its own task feeding a capacity-1 channel, so
//! the consumer (the SSE framer) gates upstream consumption: a slow
//! client transparently slows token reads without buffering. Dropping the
//! returned stream, or cancelling the token, stops the task and closes
//! the upstream connection on its next suspension point.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chatrelay_core::{Error, LlmMessage, StreamEvent};
use chatrelay_provider::{
    connect_with_retry, ChatClient, CompletionRequest, RetryPolicy, ToolDefinition, ToolUseChunk,
};
use chatrelay_tools::ToolRegistry;

pub struct ChatAgent {
    client: Arc<ChatClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    system_prompt: String,
    enabled_tools: Vec<String>,
    streaming: bool,
    retry: RetryPolicy,
}

impl ChatAgent {
    pub fn new(
        client: Arc<ChatClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        enabled_tools: Vec<String>,
        streaming: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            tools,
            model: model.into(),
            system_prompt: system_prompt.into(),
            enabled_tools,
            streaming,
            retry,
        }
    }

    /// Run the upstream call, yielding output events in upstream order.
    ///
    /// Every exit path of the producer emits exactly one terminal event,
    /// except cancellation, where the stream is abandoned silently.
    pub fn run(
        self,
        messages: Vec<LlmMessage>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            if self.streaming {
                self.produce_streaming(messages, cancel, tx).await;
            } else {
                self.produce_buffered(messages, cancel, tx).await;
            }
        });
        ReceiverStream::new(rx)
    }

    fn build_request(&self, messages: Vec<LlmMessage>) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.model.clone(), messages);
        request.system = Some(self.system_prompt.clone());
        request.tools = self.tool_definitions();
        request
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.enabled_tools.is_empty() {
            return None;
        }
        let defs: Vec<ToolDefinition> = self
            .tools
            .subset(&self.enabled_tools)
            .into_iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.parameters_schema(),
            })
            .collect();
        if defs.is_empty() {
            None
        } else {
            Some(defs)
        }
    }

    async fn produce_streaming(
        &self,
        messages: Vec<LlmMessage>,
        cancel: CancellationToken,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let request = self.build_request(messages);

        // Retry applies only here; once bytes flow, failures terminate.
        let stream = match connect_with_retry(&self.retry, &cancel, || {
            self.client.stream(&request)
        })
        .await
        {
            Ok(stream) => stream,
            Err(Error::Cancelled) => return,
            Err(e) => {
                warn!(error = %e, "upstream connection failed");
                let _ = tx.send(StreamEvent::error(e.user_message())).await;
                return;
            }
        };

        let mut stream = stream;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("stream cancelled, dropping upstream call");
                    return;
                }
                next = stream.next() => next,
            };

            match next {
                None => {
                    let _ = tx.send(StreamEvent::Finish).await;
                    return;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "upstream stream failed mid-flight");
                    let _ = tx.send(StreamEvent::error(e.user_message())).await;
                    return;
                }
                Some(Ok(chunk)) => {
                    if let Some(delta) = chunk.delta {
                        if !delta.is_empty()
                            && tx.send(StreamEvent::text_delta(delta)).await.is_err()
                        {
                            return;
                        }
                    }
                    if let Some(tool_use) = chunk.tool_use {
                        if !self.emit_tool_events(tool_use, &tx).await {
                            return;
                        }
                    }
                    // The stop reason itself carries no client-visible
                    // payload; `finish` is emitted when the stream ends.
                }
            }
        }
    }

    async fn produce_buffered(
        &self,
        messages: Vec<LlmMessage>,
        cancel: CancellationToken,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let request = self.build_request(messages);

        let run = connect_with_retry(&self.retry, &cancel, || self.client.complete(&request));
        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = run => result,
        };

        let completion = match completion {
            Ok(completion) => completion,
            Err(Error::Cancelled) => return,
            Err(e) => {
                warn!(error = %e, "upstream completion failed");
                let _ = tx.send(StreamEvent::error(e.user_message())).await;
                return;
            }
        };

        // Replay the collected response as a single burst.
        if !completion.text.is_empty()
            && tx
                .send(StreamEvent::text_delta(completion.text))
                .await
                .is_err()
        {
            return;
        }
        for tool_use in completion.tool_calls {
            if cancel.is_cancelled() {
                return;
            }
            if !self.emit_tool_events(tool_use, &tx).await {
                return;
            }
        }
        let _ = tx.send(StreamEvent::Finish).await;
    }

    /// Emit `tool-call` and, for registered tools, the immediately
    /// following `tool-result`. Returns false when the stream must stop
    /// (terminal emitted or receiver gone).
    async fn emit_tool_events(
        &self,
        tool_use: ToolUseChunk,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> bool {
        let args: serde_json::Value = if tool_use.input_json.trim().is_empty() {
            // Nothing streamed at all; distinct from a truncated document.
            serde_json::json!({})
        } else {
            match serde_json::from_str(&tool_use.input_json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(tool = %tool_use.name, error = %e, "tool arguments failed to parse");
                    let err = Error::ParseFailure(e.to_string());
                    let _ = tx.send(StreamEvent::error(err.user_message())).await;
                    return false;
                }
            }
        };

        let tool_call_id = if tool_use.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            tool_use.id
        };

        if tx
            .send(StreamEvent::ToolCall {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_use.name.clone(),
                args: args.clone(),
            })
            .await
            .is_err()
        {
            return false;
        }

        let enabled = self.enabled_tools.iter().any(|n| *n == tool_use.name);
        let Some(tool) = (if enabled {
            self.tools.get(&tool_use.name)
        } else {
            None
        }) else {
            warn!(tool = %tool_use.name, "model called a tool that is not enabled, skipping result");
            return true;
        };

        match tool.execute(args) {
            Ok(result) => tx
                .send(StreamEvent::ToolResult {
                    tool_call_id,
                    result,
                })
                .await
                .is_ok(),
            Err(e) => {
                warn!(tool = %tool_use.name, error = %e, "tool execution failed");
                let _ = tx.send(StreamEvent::error(e.user_message())).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::config::UpstreamSettings;
    use chatrelay_tools::register_builtin_tools;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(frames: &[&str]) -> String {
        frames
            .iter()
            .map(|f| format!("data: {f}\n\n"))
            .collect::<String>()
    }

    async fn mount_stream(server: &MockServer, frames: &[&str]) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(frames), "text/event-stream"),
            )
            .mount(server)
            .await;
    }

    fn agent_for(server: &MockServer, enabled_tools: Vec<String>, streaming: bool) -> ChatAgent {
        let settings = UpstreamSettings {
            api_key: "sk-test".into(),
            base_url: server.uri(),
            ..UpstreamSettings::default()
        };
        let client = Arc::new(ChatClient::new(reqwest::Client::new(), &settings));
        let mut tools = ToolRegistry::new();
        register_builtin_tools(&mut tools);
        ChatAgent::new(
            client,
            Arc::new(tools),
            "gpt-4o",
            "test prompt",
            enabled_tools,
            streaming,
            RetryPolicy::default().with_max_attempts(1),
        )
    }

    async fn collect(agent: ChatAgent) -> Vec<StreamEvent> {
        let cancel = CancellationToken::new();
        let mut stream = agent.run(vec![LlmMessage::user("hi")], cancel);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn text_deltas_then_finish() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"content":"He"},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"llo"},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        let events = collect(agent_for(&server, vec![], true)).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::text_delta("He"),
                StreamEvent::text_delta("llo"),
                StreamEvent::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn tool_call_followed_by_result() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"generateForm","arguments":"{\"type\":\"form\",\"title\":\"T\",\"fields\":[]}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        let events = collect(agent_for(
            &server,
            vec!["generateForm".into()],
            true,
        ))
        .await;

        assert_eq!(events.len(), 3);
        match &events[0] {
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                assert_eq!(tool_call_id, "call_1");
                assert_eq!(tool_name, "generateForm");
                assert_eq!(args["title"], "T");
            }
            other => panic!("expected tool-call, got {other:?}"),
        }
        match &events[1] {
            StreamEvent::ToolResult {
                tool_call_id,
                result,
            } => {
                assert_eq!(tool_call_id, "call_1");
                // Display contract: the result is the validated args.
                assert_eq!(result["type"], "form");
                assert_eq!(result["title"], "T");
            }
            other => panic!("expected tool-result, got {other:?}"),
        }
        assert_eq!(events[2], StreamEvent::Finish);
    }

    #[tokio::test]
    async fn unparseable_tool_args_terminate_with_error() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"generateForm","arguments":"{\"title\": \"never closed"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        let events = collect(agent_for(
            &server,
            vec!["generateForm".into()],
            true,
        ))
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn tool_validation_failure_terminates_with_error() {
        let server = MockServer::start().await;
        // Args parse as JSON but fail the typed schema (missing fields).
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"generateChart","arguments":"{\"title\":\"x\"}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        let events = collect(agent_for(
            &server,
            vec!["generateChart".into()],
            true,
        ))
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::ToolCall { .. }));
        assert!(matches!(events[1], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn disabled_tool_gets_no_result() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"generateCode","arguments":"{\"language\":\"rust\",\"code\":\"fn main() {}\"}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        // generateCode is registered but not enabled for this request.
        let events = collect(agent_for(&server, vec!["generateForm".into()], true)).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::ToolCall { .. }));
        assert_eq!(events[1], StreamEvent::Finish);
    }

    #[tokio::test]
    async fn upstream_failure_becomes_error_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let events = collect(agent_for(&server, vec![], true)).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn buffered_mode_replays_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Looks good overall."},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let events = collect(agent_for(&server, vec![], false)).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::text_delta("Looks good overall."),
                StreamEvent::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_abandons_stream_without_terminal() {
        let server = MockServer::start().await;
        // Long enough that the capacity-1 channel keeps the producer well
        // away from the end of the stream when cancellation lands.
        let frames: Vec<String> = (0..16)
            .map(|i| {
                format!(
                    r#"{{"choices":[{{"index":0,"delta":{{"content":"tok{i}"}},"finish_reason":null}}]}}"#
                )
            })
            .chain(["[DONE]".to_string()])
            .collect();
        let frame_refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        mount_stream(&server, &frame_refs).await;

        let agent = agent_for(&server, vec![], true);
        let cancel = CancellationToken::new();
        let mut stream = agent.run(vec![LlmMessage::user("hi")], cancel.clone());

        let first = stream.next().await;
        assert_eq!(first, Some(StreamEvent::text_delta("tok0")));
        cancel.cancel();

        // The producer finishes at most the send it is blocked on, then
        // observes cancellation and exits without a terminal event.
        let mut rest = Vec::new();
        while let Some(event) = stream.next().await {
            rest.push(event);
        }
        assert!(rest.len() < 15, "producer kept going after cancel: {rest:?}");
        assert!(
            rest.iter().all(|e| !e.is_terminal()),
            "unexpected terminal in {rest:?}"
        );
    }

    #[tokio::test]
    async fn empty_deltas_are_dropped() {
        let server = MockServer::start().await;
        mount_stream(
            &server,
            &[
                r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"hi"},"finish_reason":null}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        )
        .await;

        let events = collect(agent_for(&server, vec![], true)).await;
        assert_eq!(
            events,
            vec![StreamEvent::text_delta("hi"), StreamEvent::Finish]
        );
    }
}
