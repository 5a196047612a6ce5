//! # Company Research Agent
//!
//! An LLM research agent that fills a structured record about a company.
//! The model searches the web, scrapes pages into notes, and proposes a
//! final answer; a second model pass judges the proposal before it is
//! coerced into the schema and returned.
//!
//! ```rust,ignore
//! use company_research_agent::{Orchestrator, RunRequest};
//!
//! let orchestrator = Orchestrator::new(llm, search, fetcher);
//! let output = orchestrator.run(&RunRequest::company("Acme Corp")).await?;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod schema;
pub mod tools;
pub mod transcript;

pub use config::{Config, ModelProvider, SearchBackend};
pub use enrich::{CellValue, EnrichmentRow, EnrichmentSummary, EnrichmentTable, Enricher};
pub use error::{ResearchError, SchemaError, ScrapeError, SearchError, TableError};
pub use llm::{build_provider, LLMConfig, LLMProvider, LLMResponse, TokenUsage};
pub use orchestrator::{Orchestrator, ResearchOutput, ResearchReport, Route, RunRequest, Subject};
pub use schema::{FieldSpec, FieldType, Record, Schema};
pub use tools::{DuckDuckGoSearch, HttpPageFetcher, PageFetcher, SearchProvider, SearchResult, TavilySearch};
pub use transcript::{Message, Role, ToolCall, Transcript};
