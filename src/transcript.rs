//! Conversation transcript
//!
//! One transcript belongs to exactly one research session. It only ever
//! grows: every state transition appends, nothing rewrites history.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Opaque id used to correlate the tool result with this call
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Tool result tagged with the id of the call that produced it.
    pub fn tool(content: &str, tool_call_id: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// Tool calls carried by this message, empty when there are none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// Append-only message history for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Text used for synthetic results of tool calls that were never executed.
pub const UNANSWERED_TOOL_CALL: &str =
    "was not executed - only one tool call per turn is allowed.";

/// Answer every dangling tool call with a synthetic tool message.
///
/// Chat providers reject an assistant turn whose tool calls have no result.
/// The returned copy inserts one tool message directly after each assistant
/// turn for every call that has no matching `tool_call_id` anywhere later in
/// the history. The input slice is left untouched.
pub fn patch_dangling_tool_calls(messages: &[Message]) -> Vec<Message> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    let mut patched = Vec::with_capacity(messages.len());
    for message in messages {
        patched.push(message.clone());
        if message.role != Role::Assistant {
            continue;
        }
        for call in message.tool_calls() {
            if !answered.contains(call.id.as_str()) {
                tracing::debug!(tool_name = %call.name, tool_call_id = %call.id, "Patching dangling tool call");
                let content = format!("Tool call '{}' (ID: {}) {}", call.name, call.id, UNANSWERED_TOOL_CALL);
                patched.push(Message::tool(&content, &call.id));
            }
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, json!({}))
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = Message::tool("results", "call_7");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_7"));
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_tool_calls_accessor() {
        assert!(Message::assistant("hi").tool_calls().is_empty());
        let msg = Message::assistant_with_tool_calls("", vec![call("a", "Search")]);
        assert_eq!(msg.tool_calls().len(), 1);
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn test_transcript_is_append_only() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());
        transcript.push(Message::user("one"));
        transcript.push(Message::assistant("two"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().unwrap().content, "two");
    }

    #[test]
    fn test_patch_leaves_answered_calls_alone() {
        let messages = vec![
            Message::user("go"),
            Message::assistant_with_tool_calls("", vec![call("a", "Search")]),
            Message::tool("found it", "a"),
        ];
        assert_eq!(patch_dangling_tool_calls(&messages), messages);
    }

    #[test]
    fn test_patch_answers_each_dangling_call_in_place() {
        let messages = vec![
            Message::user("go"),
            Message::assistant_with_tool_calls("", vec![call("a", "Search"), call("b", "Info")]),
            Message::user("You must call one, and only one, tool!"),
        ];

        let patched = patch_dangling_tool_calls(&messages);

        assert_eq!(patched.len(), 5);
        assert_eq!(patched[2].tool_call_id.as_deref(), Some("a"));
        assert_eq!(patched[3].tool_call_id.as_deref(), Some("b"));
        assert!(patched[3].content.contains("'Info'"));
        assert_eq!(patched[4].role, Role::User);
        // Source history is not modified
        assert_eq!(messages.len(), 3);
    }
}
