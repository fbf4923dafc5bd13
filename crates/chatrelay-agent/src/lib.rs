//! Per-request chat agents and the process-wide agent registry.
//!
//! A [`ChatAgent`] wraps one upstream model call and projects its
//! heterogeneous events (token deltas, tool-call assembly, completion,
//! errors) onto the stable output taxonomy. The [`AgentRegistry`] holds
//! named pre-built agent descriptors with specialized prompts and tool
//! bundles; it is populated once at startup and read-only afterwards.

pub mod chat_agent;
pub mod registry;

pub use chat_agent::ChatAgent;
pub use registry::{AgentDescriptor, AgentRegistry, DEFAULT_SYSTEM_PROMPT};
