//! Structured judgment of a proposed final answer

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResearchError;
use crate::tools::ToolDefinition;
use crate::transcript::Message;

pub const JUDGMENT_TOOL: &str = "Judgment";

/// The judge's verdict on a finalize proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Judgment {
    pub reason: String,
    pub good: bool,
}

/// The single tool offered to the model in judge mode.
pub fn judgment_definition() -> ToolDefinition {
    ToolDefinition {
        name: JUDGMENT_TOOL.to_string(),
        description: "Record whether the proposed info is good, with your reasoning.".to_string(),
        parameters: serde_json::json!({
            "title": JUDGMENT_TOOL,
            "type": "object",
            "properties": {
                "reason": {
                    "title": "Reason",
                    "type": "string",
                    "description": "Why the info is or is not good, and what could be improved"
                },
                "good": {
                    "title": "Good",
                    "type": "boolean",
                    "description": "True if the info is good enough to submit"
                }
            },
            "required": ["reason", "good"]
        }),
    }
}

/// Read a [`Judgment`] out of the judge's reply.
///
/// Tool call arguments win; a JSON object embedded in the text is the
/// fallback for models that answer inline.
pub fn parse_judgment(message: &Message) -> Result<Judgment, ResearchError> {
    let from_calls = message
        .tool_calls()
        .iter()
        .find(|call| call.name == JUDGMENT_TOOL)
        .or_else(|| message.tool_calls().first())
        .and_then(|call| judgment_from_value(&call.arguments));

    from_calls
        .or_else(|| judgment_in_text(&message.content))
        .ok_or_else(|| ResearchError::StructuredOutput(JUDGMENT_TOOL.to_string()))
}

fn judgment_from_value(value: &Value) -> Option<Judgment> {
    // Some providers hand back arguments as a JSON string
    if let Value::String(raw) = value {
        return serde_json::from_str::<Value>(raw).ok().and_then(|v| judgment_from_value(&v));
    }

    let object = value.as_object()?;
    let good = match object.get("good")? {
        Value::Bool(b) => *b,
        Value::String(s) if s.eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.eq_ignore_ascii_case("false") => false,
        _ => return None,
    };
    let reason = match object.get("reason") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Some(Judgment { reason, good })
}

/// First JSON object in free text that reads as a verdict.
///
/// Prose may hold stray braces, so every `{` is tried as a start.
fn judgment_in_text(text: &str) -> Option<Judgment> {
    text.match_indices('{').find_map(|(start, _)| {
        let value = serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        judgment_from_value(&value)
    })
}
