//! Core types for the chatrelay streaming chat proxy.
//!
//! Everything that crosses a crate boundary lives here: configuration,
//! the error taxonomy, the client-facing message model, the flat message
//! model consumed by the upstream LLM client, the output event taxonomy,
//! and the conversion between the two message models.

pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod llm;
pub mod message;
pub mod title;

pub use error::{Error, ErrorCode, ErrorResponse, Result};
pub use events::StreamEvent;
pub use llm::{LlmMessage, LlmToolCall};
pub use message::{ChatRequest, MessagePart, Role, UiMessage};
