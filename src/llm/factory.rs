//! Builds the configured model client
//!
//! One client per process; every session receives the same
//! `Arc<dyn LLMProvider>` handle.

use std::sync::Arc;

use rig::client::{CompletionClient, ProviderClient};
use rig::providers::{anthropic, ollama, openai};
use tracing::debug;

use super::{LLMProvider, RigAgentAdapter};
use crate::config::{Config, ModelProvider};
use crate::error::ResearchError;

/// Create the model collaborator described by `config`.
pub fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>, ResearchError> {
    let model = config.effective_model();
    debug!(provider = %config.provider, model = %model, "Building LLM provider");

    let provider: Arc<dyn LLMProvider> = match config.provider {
        ModelProvider::Anthropic => {
            require_env("ANTHROPIC_API_KEY")?;
            let agent = anthropic::Client::from_env()
                .agent(&model)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens)
                .build();
            Arc::new(RigAgentAdapter::new(agent, "anthropic", model))
        }
        ModelProvider::OpenAI => {
            require_env("OPENAI_API_KEY")?;
            let agent = openai::Client::from_env()
                .agent(&model)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens)
                .build();
            Arc::new(RigAgentAdapter::new(agent, "openai", model))
        }
        ModelProvider::Ollama => {
            // Rig's Ollama client reads its base URL from the environment.
            std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
            let agent = ollama::Client::from_env()
                .agent(&model)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens)
                .build();
            Arc::new(RigAgentAdapter::new(agent, "ollama", model))
        }
    };

    Ok(provider)
}

fn require_env(key: &str) -> Result<(), ResearchError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(ResearchError::Config(format!("{} environment variable not set", key))),
    }
}
