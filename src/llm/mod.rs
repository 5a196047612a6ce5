//! Model collaborator
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Orchestrator / Scraper           │
//! └─────────────────┬───────────────────────┘
//!                   │ uses
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │        LLMProvider (trait)              │
//! │  - complete(messages, tools, config)    │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │         RigAgentAdapter                 │
//! └─────────────────┬───────────────────────┘
//!          ┌────────┼─────────┐
//!          ▼        ▼         ▼
//!      Anthropic  OpenAI   Ollama
//! ```

mod config;
mod factory;
mod provider;
mod rig_adapter;

pub use config::{LLMConfig, TokenUsage};
pub use factory::build_provider;
pub use provider::{LLMProvider, LLMResponse};
pub use rig_adapter::RigAgentAdapter;
