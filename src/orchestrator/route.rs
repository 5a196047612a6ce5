//! Transition decision after a model turn

use crate::schema::SCHEMA_TITLE;
use crate::transcript::{Message, ToolCall};

/// Where the session goes after the model proposed its next message.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Exactly one call to `Search`, `ScrapeWebsite` or any other non-finalize name.
    Dispatch(ToolCall),
    /// Exactly one call to the finalize action.
    Validate(ToolCall),
    /// Zero calls or more than one.
    Reject,
}

pub fn route_after_propose(message: &Message) -> Route {
    match message.tool_calls() {
        [call] if call.name == SCHEMA_TITLE => Route::Validate(call.clone()),
        [call] => Route::Dispatch(call.clone()),
        _ => Route::Reject,
    }
}
