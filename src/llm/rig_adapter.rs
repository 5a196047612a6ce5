//! Adapter for using Rig agents as an [`LLMProvider`]
//!
//! Rig normally runs its own tool loop inside `PromptRequest`. The research
//! session needs to see every tool call and route it itself, so this adapter
//! only uses Rig's low-level completion API: tool definitions are forwarded
//! so the model can emit calls, and execution stays with the orchestrator.

use async_trait::async_trait;

use rig::agent::Agent;
use rig::completion::{Completion, CompletionModel, Message as RigMessage, ToolDefinition as RigToolDefinition};
use rig::message::AssistantContent;
use rig::OneOrMany;

use super::{LLMConfig, LLMProvider, LLMResponse, TokenUsage};
use crate::error::ResearchError;
use crate::tools::ToolDefinition;
use crate::transcript::{patch_dangling_tool_calls, Message, Role, ToolCall};

/// Wraps a Rig `Agent<M>` so any of Rig's providers can drive a session.
pub struct RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Agent<M>,
    provider_name: String,
    model_name: String,
}

impl<M> RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(agent: Agent<M>, provider_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            agent,
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }

    fn llm_error(&self, error: impl std::fmt::Display) -> ResearchError {
        ResearchError::Llm(format!("{} completion failed: {}", self.provider_name, error))
    }
}

#[async_trait]
impl<M> LLMProvider for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError> {
        let (prompt, history) = split_prompt(&patch_dangling_tool_calls(messages));

        let mut request = self
            .agent
            .completion(prompt, history)
            .await
            .map_err(|e| self.llm_error(e))?;

        if let Some(temperature) = config.and_then(|c| c.temperature) {
            request = request.temperature(temperature);
        }
        if let Some(max_tokens) = config.and_then(|c| c.max_tokens) {
            request = request.max_tokens(max_tokens);
        }
        if !tools.is_empty() {
            request = request.tools(tools.iter().map(to_rig_tool).collect());
        }

        let response = request.send().await.map_err(|e| self.llm_error(e))?;

        Ok(LLMResponse::new(from_rig_choice(&response.choice)).with_usage(TokenUsage::from_rig_usage(&response.usage)))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.model_name
    }
}

/// Last message becomes the prompt, the rest is history.
fn split_prompt(messages: &[Message]) -> (RigMessage, Vec<RigMessage>) {
    let mut history: Vec<RigMessage> = messages.iter().map(to_rig_message).collect();
    let prompt = history.pop().unwrap_or_else(|| RigMessage::user(""));
    (prompt, history)
}

fn to_rig_message(message: &Message) -> RigMessage {
    match message.role {
        Role::User => RigMessage::user(message.content.clone()),
        Role::Tool => RigMessage::tool_result(message.tool_call_id.clone().unwrap_or_default(), message.content.clone()),
        Role::Assistant => {
            let text = (!message.content.is_empty()).then(|| AssistantContent::text(message.content.clone()));
            let calls = message
                .tool_calls()
                .iter()
                .map(|call| AssistantContent::tool_call(call.id.clone(), call.name.clone(), call.arguments.clone()));
            let content = OneOrMany::many(text.into_iter().chain(calls))
                .unwrap_or_else(|_| OneOrMany::one(AssistantContent::text("")));
            RigMessage::Assistant { id: None, content }
        }
    }
}

fn to_rig_tool(tool: &ToolDefinition) -> RigToolDefinition {
    RigToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}

fn from_rig_choice(choice: &OneOrMany<AssistantContent>) -> Message {
    let mut text = String::new();
    let mut calls = Vec::new();

    for item in choice.iter() {
        match item {
            AssistantContent::Text(t) => text.push_str(&t.text),
            AssistantContent::ToolCall(call) => calls.push(ToolCall::new(
                call.id.clone(),
                call.function.name.clone(),
                call.function.arguments.clone(),
            )),
            _ => {}
        }
    }

    if calls.is_empty() {
        Message::assistant(&text)
    } else {
        Message::assistant_with_tool_calls(&text, calls)
    }
}

impl<M> std::fmt::Debug for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigAgentAdapter")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}
