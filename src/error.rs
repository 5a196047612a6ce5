//! Error types
//!
//! Recoverable conditions inside the research loop (malformed proposals,
//! coercion failures, judge rejections) never become errors. Everything in
//! this module aborts a session.

use thiserror::Error;

/// Typed errors for search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Search provider not configured: {0}")]
    NotConfigured(String),
}

impl SearchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::ServerError(_, _)
        )
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::Connection(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Errors raised while fetching a page for the scrape tool.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP error ({status}) fetching {url}")]
    Status { url: String, status: u16 },
}

/// Schema construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid field name: {0:?} is not a valid identifier")]
    InvalidFieldName(String),

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Schema must declare at least one field")]
    Empty,
}

/// Enrichment table editing and persistence errors.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Invalid column: {0}")]
    Column(#[from] SchemaError),

    #[error("Target already present: {0}")]
    DuplicateTarget(String),

    #[error("Failed to read or write table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for a research session.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Model did not return a structured {0}")]
    StructuredOutput(String),

    #[error("Research did not converge within {limit} model turns")]
    IterationLimit { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}
