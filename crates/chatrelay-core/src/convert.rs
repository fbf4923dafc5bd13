//! Conversion from the client's part-oriented messages to the flat
//! ordered model consumed by the upstream LLM client.
//!
//! This is the single place that enforces turn-structure invariants:
//! non-empty parts, tool-call id uniqueness, and tool parts only where
//! the protocol allows them.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::llm::{LlmMessage, LlmToolCall};
use crate::message::{MessagePart, Role, UiMessage};

/// Convert a conversation to the upstream message model.
///
/// Deterministic and order-preserving: for any two parts in the flattened
/// input, their derived entries keep the same relative order.
pub fn convert_messages(messages: &[UiMessage]) -> Result<Vec<LlmMessage>> {
    let mut out = Vec::new();
    // Ids issued by assistant tool invocations; duplicates are invalid.
    let mut issued: HashSet<String> = HashSet::new();
    // Ids already resolved to a result, embedded or on a following turn.
    let mut resolved: HashSet<String> = HashSet::new();

    for msg in messages {
        if msg.parts.is_empty() {
            return Err(Error::InvalidMessage(format!(
                "message '{}' has no parts",
                msg.id
            )));
        }
        match msg.role {
            Role::System => out.push(LlmMessage::System {
                text: text_only(msg)?,
            }),
            Role::User => convert_user(msg, &mut resolved, &mut out)?,
            Role::Assistant => convert_assistant(msg, &mut issued, &mut resolved, &mut out)?,
        }
    }

    Ok(out)
}

/// Concatenate text parts joined by a single newline; any tool part fails.
fn text_only(msg: &UiMessage) -> Result<String> {
    let mut texts = Vec::with_capacity(msg.parts.len());
    for part in &msg.parts {
        match part {
            MessagePart::Text { text } => texts.push(text.as_str()),
            MessagePart::ToolInvocation { .. } => {
                return Err(Error::InvalidMessage(format!(
                    "message '{}': tool-invocation part not allowed in a system message",
                    msg.id
                )))
            }
        }
    }
    Ok(texts.join("\n"))
}

/// User messages: consecutive text parts collapse into one `User` entry;
/// a tool-invocation part is the client-supplied result for a prior call
/// and becomes a `Tool` entry directly.
fn convert_user(
    msg: &UiMessage,
    resolved: &mut HashSet<String>,
    out: &mut Vec<LlmMessage>,
) -> Result<()> {
    let mut texts: Vec<&str> = Vec::new();

    for part in &msg.parts {
        match part {
            MessagePart::Text { text } => texts.push(text),
            MessagePart::ToolInvocation {
                tool_call_id,
                tool_name,
                result,
                ..
            } => {
                let Some(result) = result else {
                    return Err(Error::InvalidMessage(format!(
                        "message '{}': tool-invocation '{}' in a user message must carry a result",
                        msg.id, tool_call_id
                    )));
                };
                if !resolved.insert(tool_call_id.clone()) {
                    return Err(Error::InvalidMessage(format!(
                        "message '{}': tool call '{}' resolved more than once",
                        msg.id, tool_call_id
                    )));
                }
                if !texts.is_empty() {
                    out.push(LlmMessage::User {
                        text: std::mem::take(&mut texts).join("\n"),
                    });
                }
                out.push(LlmMessage::Tool {
                    id: tool_call_id.clone(),
                    name: tool_name.clone(),
                    result: result.clone(),
                });
            }
        }
    }

    if !texts.is_empty() {
        out.push(LlmMessage::User {
            text: texts.join("\n"),
        });
    }
    Ok(())
}

/// Assistant messages: a run of text and tool-invocation parts becomes one
/// assistant entry (text concatenated, calls listed), immediately followed
/// by `Tool` entries for any embedded results. A text part after a
/// resolved invocation starts a new assistant entry, so the derived
/// entries keep the part order.
fn convert_assistant(
    msg: &UiMessage,
    issued: &mut HashSet<String>,
    resolved: &mut HashSet<String>,
    out: &mut Vec<LlmMessage>,
) -> Result<()> {
    let mut texts: Vec<&str> = Vec::new();
    let mut calls: Vec<LlmToolCall> = Vec::new();
    let mut results: Vec<(String, String, serde_json::Value)> = Vec::new();

    fn flush(
        texts: &mut Vec<&str>,
        calls: &mut Vec<LlmToolCall>,
        results: &mut Vec<(String, String, serde_json::Value)>,
        out: &mut Vec<LlmMessage>,
    ) {
        if texts.is_empty() && calls.is_empty() {
            return;
        }
        let text = if texts.is_empty() {
            None
        } else {
            Some(std::mem::take(texts).join("\n"))
        };
        out.push(LlmMessage::Assistant {
            text,
            tool_calls: std::mem::take(calls),
        });
        for (id, name, result) in results.drain(..) {
            out.push(LlmMessage::Tool { id, name, result });
        }
    }

    for part in &msg.parts {
        match part {
            MessagePart::Text { text } => {
                if !results.is_empty() {
                    flush(&mut texts, &mut calls, &mut results, out);
                }
                texts.push(text);
            }
            MessagePart::ToolInvocation {
                tool_call_id,
                tool_name,
                args,
                result,
            } => {
                if !issued.insert(tool_call_id.clone()) {
                    return Err(Error::InvalidMessage(format!(
                        "message '{}': duplicate toolCallId '{}'",
                        msg.id, tool_call_id
                    )));
                }
                calls.push(LlmToolCall {
                    id: tool_call_id.clone(),
                    name: tool_name.clone(),
                    args: args.clone(),
                });
                if let Some(result) = result {
                    resolved.insert(tool_call_id.clone());
                    results.push((tool_call_id.clone(), tool_name.clone(), result.clone()));
                }
            }
        }
    }
    flush(&mut texts, &mut calls, &mut results, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(id: &str, name: &str, resolved: bool) -> MessagePart {
        MessagePart::ToolInvocation {
            tool_call_id: id.into(),
            tool_name: name.into(),
            args: json!({"title": "T"}),
            result: resolved.then(|| json!({"title": "T"})),
        }
    }

    #[test]
    fn test_user_text_parts_join_with_newline() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::User,
            parts: vec![
                MessagePart::Text {
                    text: "first".into(),
                },
                MessagePart::Text {
                    text: "second".into(),
                },
            ],
        }];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(out, vec![LlmMessage::user("first\nsecond")]);
    }

    #[test]
    fn test_system_message() {
        let msgs = [UiMessage::text("m1", Role::System, "be terse")];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(
            out,
            vec![LlmMessage::System {
                text: "be terse".into()
            }]
        );
    }

    #[test]
    fn test_system_rejects_tool_parts() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::System,
            parts: vec![invocation("c1", "generateForm", true)],
        }];
        assert!(matches!(
            convert_messages(&msgs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_empty_parts_rejected() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::User,
            parts: vec![],
        }];
        assert!(matches!(
            convert_messages(&msgs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_assistant_with_resolved_call() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::Assistant,
            parts: vec![
                MessagePart::Text {
                    text: "here you go".into(),
                },
                invocation("c1", "generateForm", true),
            ],
        }];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            LlmMessage::Assistant {
                text: Some("here you go".into()),
                tool_calls: vec![LlmToolCall {
                    id: "c1".into(),
                    name: "generateForm".into(),
                    args: json!({"title": "T"}),
                }],
            }
        );
        assert_eq!(
            out[1],
            LlmMessage::Tool {
                id: "c1".into(),
                name: "generateForm".into(),
                result: json!({"title": "T"}),
            }
        );
    }

    #[test]
    fn test_text_after_resolved_call_splits_entries() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::Assistant,
            parts: vec![
                MessagePart::Text {
                    text: "before".into(),
                },
                invocation("c1", "generateChart", true),
                MessagePart::Text {
                    text: "after".into(),
                },
            ],
        }];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(out.len(), 3);
        assert!(matches!(
            &out[0],
            LlmMessage::Assistant { text: Some(t), tool_calls } if t == "before" && tool_calls.len() == 1
        ));
        assert!(matches!(&out[1], LlmMessage::Tool { id, .. } if id == "c1"));
        assert!(matches!(
            &out[2],
            LlmMessage::Assistant { text: Some(t), tool_calls } if t == "after" && tool_calls.is_empty()
        ));
    }

    #[test]
    fn test_pending_call_has_no_tool_entry() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::Assistant,
            parts: vec![invocation("c1", "generateCode", false)],
        }];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            LlmMessage::Assistant { text: None, tool_calls } if tool_calls.len() == 1
        ));
    }

    #[test]
    fn test_duplicate_tool_call_id_rejected() {
        let msgs = [
            UiMessage {
                id: "m1".into(),
                role: Role::Assistant,
                parts: vec![invocation("c1", "generateForm", true)],
            },
            UiMessage {
                id: "m2".into(),
                role: Role::Assistant,
                parts: vec![invocation("c1", "generateForm", false)],
            },
        ];
        assert!(matches!(
            convert_messages(&msgs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_user_supplied_tool_result() {
        let msgs = [
            UiMessage {
                id: "m1".into(),
                role: Role::Assistant,
                parts: vec![invocation("c1", "generateCard", false)],
            },
            UiMessage {
                id: "m2".into(),
                role: Role::User,
                parts: vec![
                    invocation("c1", "generateCard", true),
                    MessagePart::Text {
                        text: "thanks".into(),
                    },
                ],
            },
        ];
        let out = convert_messages(&msgs).unwrap();
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[0], LlmMessage::Assistant { .. }));
        assert!(matches!(&out[1], LlmMessage::Tool { id, .. } if id == "c1"));
        assert_eq!(out[2], LlmMessage::user("thanks"));
    }

    #[test]
    fn test_user_tool_invocation_without_result_rejected() {
        let msgs = [UiMessage {
            id: "m1".into(),
            role: Role::User,
            parts: vec![invocation("c1", "generateForm", false)],
        }];
        assert!(matches!(
            convert_messages(&msgs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_double_resolution_rejected() {
        let msgs = [
            UiMessage {
                id: "m1".into(),
                role: Role::User,
                parts: vec![invocation("c1", "generateForm", true)],
            },
            UiMessage {
                id: "m2".into(),
                role: Role::User,
                parts: vec![invocation("c1", "generateForm", true)],
            },
        ];
        assert!(matches!(
            convert_messages(&msgs),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let msgs = [
            UiMessage::text("m1", Role::System, "sys"),
            UiMessage::text("m2", Role::User, "hello"),
            UiMessage {
                id: "m3".into(),
                role: Role::Assistant,
                parts: vec![
                    MessagePart::Text { text: "hi".into() },
                    invocation("c1", "generateForm", true),
                ],
            },
            UiMessage::text("m4", Role::User, "again"),
        ];
        let a = convert_messages(&msgs).unwrap();
        let b = convert_messages(&msgs).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }
}
