//! # Configuration Module
//!
//! Loads settings from the environment (and a `.env` file when present),
//! layered over defaults. Command-line flags are applied on top by the
//! binary before [`Config::validate`] runs.

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Which model backend drives the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Anthropic,
    OpenAI,
    Ollama,
}

impl ModelProvider {
    /// Model used when none is configured explicitly.
    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "claude-3-5-sonnet-20240620",
            ModelProvider::OpenAI => "gpt-4o",
            ModelProvider::Ollama => "llama3.2",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::OpenAI => "openai",
            ModelProvider::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            "openai" => Ok(ModelProvider::OpenAI),
            "ollama" => Ok(ModelProvider::Ollama),
            other => anyhow::bail!("Unknown LLM provider '{}' (expected anthropic, openai or ollama)", other),
        }
    }
}

/// Which web search backend serves the `Search` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Tavily,
    DuckDuckGo,
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchBackend::Tavily => f.write_str("tavily"),
            SearchBackend::DuckDuckGo => f.write_str("duckduckgo"),
        }
    }
}

impl FromStr for SearchBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(SearchBackend::Tavily),
            "duckduckgo" | "ddg" => Ok(SearchBackend::DuckDuckGo),
            other => anyhow::bail!("Unknown search provider '{}' (expected tavily or duckduckgo)", other),
        }
    }
}

/// Main configuration for the research agent.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ModelProvider,

    /// Model override; `None` means the provider's default model
    pub model: Option<String>,

    /// Ollama server URL (only used with the ollama provider)
    pub ollama_host: String,

    /// Sampling temperature for every model call
    pub temperature: f64,

    /// Completion token cap (Anthropic requires one)
    pub max_tokens: u64,

    pub search_backend: SearchBackend,

    pub tavily_api_key: Option<String>,

    /// Results returned per `Search` call
    pub max_search_results: usize,

    /// Page text handed to the summarizer is cut to this many characters
    pub scrape_max_chars: usize,

    /// Model turns allowed per session before it is aborted
    pub max_iterations: usize,

    /// Sessions run at the same time in batch commands
    pub concurrency: usize,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Anthropic,
            model: None,
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            search_backend: SearchBackend::DuckDuckGo,
            tavily_api_key: None,
            max_search_results: 5,
            scrape_max_chars: 20_000,
            max_iterations: 25,
            concurrency: 4,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// When `SEARCH_PROVIDER` is unset, Tavily is used if `TAVILY_API_KEY`
    /// is present and DuckDuckGo otherwise.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_PROVIDER") {
            config.provider = val.parse()?;
        }

        if let Ok(val) = env::var("LLM_MODEL") {
            if !val.trim().is_empty() {
                config.model = Some(val);
            }
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?;
        }

        if let Ok(val) = env::var("MAX_TOKENS") {
            config.max_tokens = val
                .parse()
                .context("MAX_TOKENS must be a valid positive integer")?;
        }

        config.tavily_api_key = env::var("TAVILY_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        config.search_backend = match env::var("SEARCH_PROVIDER") {
            Ok(val) => val.parse()?,
            Err(_) if config.tavily_api_key.is_some() => SearchBackend::Tavily,
            Err(_) => SearchBackend::DuckDuckGo,
        };

        if let Ok(val) = env::var("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("SCRAPE_MAX_CHARS") {
            config.scrape_max_chars = val
                .parse()
                .context("SCRAPE_MAX_CHARS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("MAX_ITERATIONS") {
            config.max_iterations = val
                .parse()
                .context("MAX_ITERATIONS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("CONCURRENCY") {
            config.concurrency = val
                .parse()
                .context("CONCURRENCY must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// The model that will actually be requested.
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Validate the configuration before any session starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.max_tokens == 0 {
            anyhow::bail!("MAX_TOKENS must be at least 1");
        }

        if !(1..=20).contains(&self.max_search_results) {
            anyhow::bail!(
                "MAX_SEARCH_RESULTS must be between 1 and 20, got: {}",
                self.max_search_results
            );
        }

        if self.scrape_max_chars == 0 {
            anyhow::bail!("SCRAPE_MAX_CHARS must be at least 1");
        }

        if self.max_iterations == 0 {
            anyhow::bail!("MAX_ITERATIONS must be at least 1");
        }

        if self.concurrency == 0 {
            anyhow::bail!("CONCURRENCY must be at least 1");
        }

        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.search_backend == SearchBackend::Tavily && self.tavily_api_key.is_none() {
            anyhow::bail!("SEARCH_PROVIDER=tavily requires TAVILY_API_KEY");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.provider, ModelProvider::Anthropic);
        assert_eq!(config.effective_model(), "claude-3-5-sonnet-20240620");
        assert_eq!(config.max_search_results, 5);
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.search_backend, SearchBackend::DuckDuckGo);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_model_override() {
        let config = Config {
            provider: ModelProvider::Ollama,
            model: Some("qwen2.5".to_string()),
            ..Config::default()
        };
        assert_eq!(config.effective_model(), "qwen2.5");
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let config = Config {
            temperature: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_iterations() {
        let config = Config {
            max_iterations: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MAX_ITERATIONS"));
    }

    #[test]
    fn test_config_validation_tavily_without_key() {
        let mut config = Config {
            search_backend: SearchBackend::Tavily,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.tavily_api_key = Some("tvly-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Anthropic".parse::<ModelProvider>().unwrap(), ModelProvider::Anthropic);
        assert_eq!("openai".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAI);
        assert_eq!(" ollama ".parse::<ModelProvider>().unwrap(), ModelProvider::Ollama);
        assert!("gemini".parse::<ModelProvider>().is_err());
        assert_eq!(ModelProvider::OpenAI.to_string(), "openai");
    }

    #[test]
    fn test_search_backend_parsing() {
        assert_eq!("ddg".parse::<SearchBackend>().unwrap(), SearchBackend::DuckDuckGo);
        assert_eq!("TAVILY".parse::<SearchBackend>().unwrap(), SearchBackend::Tavily);
        assert!("bing".parse::<SearchBackend>().is_err());
    }
}
