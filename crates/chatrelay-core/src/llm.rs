//! Flat ordered message model consumed by the upstream LLM client.
//!
//! Derived once per request from the client's part-oriented messages and
//! immutable thereafter. Every `Assistant` tool call has exactly one later
//! `Tool` entry with the same id, unless it is the terminal assistant
//! entry (a pending call the model has not resolved yet).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum LlmMessage {
    System {
        text: String,
    },
    User {
        text: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<LlmToolCall>,
    },
    Tool {
        id: String,
        name: String,
        result: serde_json::Value,
    },
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        LlmMessage::User { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        LlmMessage::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }
}
