//! Website scraping
//!
//! Scraping is two steps: [`PageFetcher`] downloads a page and turns it into
//! readable text, then [`WebsiteScraper`] asks the model to jot down notes
//! about it. Only the notes reach the research transcript.

use async_trait::async_trait;
use reqwest::Client;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ResearchError, ScrapeError};
use crate::llm::{LLMConfig, LLMProvider};
use crate::prompts;
use crate::schema::Schema;
use crate::transcript::Message;

/// Column width handed to html2text when rendering pages.
const TEXT_WIDTH: usize = 120;

/// Bytes read from a response body before the rest is dropped.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Given a URL, return the page's text content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Fetches pages over HTTP and renders HTML to plain text.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    max_chars: usize,
    max_body_bytes: usize,
}

impl HttpPageFetcher {
    pub fn new(max_chars: usize) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("company-research-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScrapeError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            max_chars,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ScrapeError::InvalidUrl(url.to_string()));
        }

        debug!(url = %trimmed, "Fetching page");
        let request_error = |e: reqwest::Error| ScrapeError::Request {
            url: trimmed.to_string(),
            message: e.to_string(),
        };

        let mut response = self.client.get(trimmed).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: trimmed.to_string(),
                status: status.as_u16(),
            });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(url = %trimmed, limit = self.max_body_bytes, "Page body cut at byte limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        let text = if is_html {
            html_to_text(&body)
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };

        Ok(truncate_chars(&text, self.max_chars))
    }
}

fn html_to_text(html: &[u8]) -> String {
    html2text::from_read(Cursor::new(html), TEXT_WIDTH)
        .unwrap_or_else(|_| String::from_utf8_lossy(html).into_owned())
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// The `ScrapeWebsite` tool: fetch a page and summarise it against the schema.
#[derive(Clone)]
pub struct WebsiteScraper {
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LLMProvider>,
    llm_config: Option<LLMConfig>,
}

impl WebsiteScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            fetcher,
            llm,
            llm_config: None,
        }
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    /// Notes about `url` relevant to `schema`.
    pub async fn scrape(&self, schema: &Schema, url: &str) -> Result<String, ResearchError> {
        let content = self.fetcher.fetch(url).await?;
        info!(url = %url, chars = content.chars().count(), "Scraped page");

        let prompt = prompts::info_prompt(schema, url, &content);
        let response = self
            .llm
            .complete(&[Message::user(&prompt)], &[], self.llm_config.as_ref())
            .await?;

        Ok(response.message.content)
    }
}
