//! Output event taxonomy for the client-facing stream.
//!
//! Closed tagged union. Field declaration order matches the wire examples
//! so that parsing an emitted event and re-serializing it is byte-stable.

use serde::{Deserialize, Serialize};

/// One event on the client-facing stream.
///
/// Exactly one terminal event ([`StreamEvent::Finish`] or
/// [`StreamEvent::Error`]) ends every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Incremental assistant text. Never empty; concatenating deltas in
    /// emission order reconstructs the assistant text.
    #[serde(rename = "text-delta")]
    TextDelta {
        #[serde(rename = "textDelta")]
        text_delta: String,
    },

    /// The model finalized a tool invocation.
    #[serde(rename = "tool-call")]
    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        args: serde_json::Value,
    },

    /// Result of executing a previously emitted tool call.
    #[serde(rename = "tool-result")]
    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        result: serde_json::Value,
    },

    /// Successful terminator.
    #[serde(rename = "finish")]
    Finish,

    /// Failure terminator, mutually exclusive with `finish`.
    #[serde(rename = "error")]
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish | StreamEvent::Error { .. })
    }

    pub fn text_delta(delta: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            text_delta: delta.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_schemas() {
        assert_eq!(
            serde_json::to_string(&StreamEvent::text_delta("He")).unwrap(),
            r#"{"type":"text-delta","textDelta":"He"}"#
        );
        assert_eq!(
            serde_json::to_string(&StreamEvent::Finish).unwrap(),
            r#"{"type":"finish"}"#
        );
        assert_eq!(
            serde_json::to_string(&StreamEvent::error("boom")).unwrap(),
            r#"{"type":"error","error":"boom"}"#
        );

        let call = StreamEvent::ToolCall {
            tool_call_id: "call_1".into(),
            tool_name: "generateForm".into(),
            args: json!({"title": "T"}),
        };
        assert_eq!(
            serde_json::to_string(&call).unwrap(),
            r#"{"type":"tool-call","toolCallId":"call_1","toolName":"generateForm","args":{"title":"T"}}"#
        );

        let result = StreamEvent::ToolResult {
            tool_call_id: "call_1".into(),
            result: json!({"title": "T"}),
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"type":"tool-result","toolCallId":"call_1","result":{"title":"T"}}"#
        );
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let frames = [
            r#"{"type":"text-delta","textDelta":"llo"}"#,
            r#"{"type":"tool-call","toolCallId":"c1","toolName":"generateChart","args":{"title":"Q"}}"#,
            r#"{"type":"tool-result","toolCallId":"c1","result":{"title":"Q"}}"#,
            r#"{"type":"finish"}"#,
            r#"{"type":"error","error":"stream timeout"}"#,
        ];
        for frame in frames {
            let event: StreamEvent = serde_json::from_str(frame).unwrap();
            assert_eq!(serde_json::to_string(&event).unwrap(), frame);
        }
    }

    #[test]
    fn test_terminal_classification() {
        assert!(StreamEvent::Finish.is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
        assert!(!StreamEvent::text_delta("x").is_terminal());
        assert!(!StreamEvent::ToolCall {
            tool_call_id: "c".into(),
            tool_name: "t".into(),
            args: json!({}),
        }
        .is_terminal());
    }
}
