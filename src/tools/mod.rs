//! Research tools offered to the model
//!
//! The model sees three actions: `Search`, `ScrapeWebsite` and the finalize
//! action named after the schema (`Info`). Only the first two are executed
//! here; finalize is routed to the checker by the orchestrator.

pub mod duckduckgo;
pub mod scrape;
pub mod search;
pub mod tavily;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

pub use duckduckgo::DuckDuckGoSearch;
pub use scrape::{HttpPageFetcher, PageFetcher, WebsiteScraper};
pub use search::{format_results, SearchProvider, SearchResult};
pub use tavily::TavilySearch;

pub const SEARCH_TOOL: &str = "Search";
pub const SCRAPE_TOOL: &str = "ScrapeWebsite";

/// Tool description handed to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub parameters: serde_json::Value,
}

/// Arguments of the `Search` tool
#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

/// Arguments of the `ScrapeWebsite` tool
#[derive(Debug, Deserialize)]
pub struct ScrapeArgs {
    pub url: String,
}

pub fn search_definition() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_TOOL.to_string(),
        description: "Call a search tool and get back some results. Use this to find pages about the company."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to execute",
                    "maxLength": 400
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn scrape_definition() -> ToolDefinition {
    ToolDefinition {
        name: SCRAPE_TOOL.to_string(),
        description: "Scrape a website and get relevant notes about the company.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute http(s) URL of the page to scrape"
                }
            },
            "required": ["url"]
        }),
    }
}

/// The finalize action: its parameters are the schema itself.
pub fn finalize_definition(schema: &Schema) -> ToolDefinition {
    ToolDefinition {
        name: schema.title().to_string(),
        description: "Call this when you are done and have gathered all the relevant info".to_string(),
        parameters: schema.to_json_schema(),
    }
}

/// All three actions, in the order they are described in the prompt.
pub fn research_tools(schema: &Schema) -> Vec<ToolDefinition> {
    vec![search_definition(), scrape_definition(), finalize_definition(schema)]
}
