//! LLM Provider trait definition

use async_trait::async_trait;

use super::config::{LLMConfig, TokenUsage};
use crate::error::ResearchError;
use crate::tools::ToolDefinition;
use crate::transcript::Message;

/// LLM completion response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The assistant's response message, possibly carrying tool calls
    pub message: Message,
    /// Token usage statistics (if available from provider)
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self { message, usage: None }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Model collaborator
///
/// One configured client is shared by every session through an
/// `Arc<dyn LLMProvider>`; implementations must not keep per-session state.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct EchoProvider;
///
/// #[async_trait]
/// impl LLMProvider for EchoProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _tools: &[ToolDefinition],
///         _config: Option<&LLMConfig>,
///     ) -> Result<LLMResponse, ResearchError> {
///         let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
///         Ok(LLMResponse::new(Message::assistant(last)))
///     }
///
///     fn name(&self) -> &str { "echo" }
///     fn default_model(&self) -> &str { "echo-1" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for the conversation, offering `tools` to the model.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier for logging
    fn default_model(&self) -> &str;
}
