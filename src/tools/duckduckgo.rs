//! DuckDuckGo HTML search backend
//!
//! DuckDuckGo has no free web search API, so this scrapes the HTML
//! endpoint. No key is needed which makes it the default backend.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::search::{SearchProvider, SearchResult};
use crate::error::SearchError;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
    max_results: usize,
    /// Pause before each request; the HTML endpoint throttles bursts
    request_delay: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SearchError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_results,
            request_delay: Duration::from_millis(500),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Extract results from a DuckDuckGo HTML results page.
    ///
    /// Each hit is an `<a class="result__a">` anchor whose href is a
    /// redirect carrying the target in `uddg=`. When no anchors are found
    /// (markup change), bare `uddg=` links are harvested with the domain
    /// as the title.
    fn parse_html(&self, html: &str) -> Vec<SearchResult> {
        let mut results = Vec::new();
        let mut seen_urls = HashSet::new();

        for block in html.split("class=\"result__a\"").skip(1) {
            if results.len() >= self.max_results {
                break;
            }

            let Some(url) = block
                .find("href=\"")
                .map(|start| &block[start + 6..])
                .and_then(|rest| rest.find('"').map(|end| &rest[..end]))
                .and_then(resolve_href)
            else {
                continue;
            };

            if url.contains("duckduckgo.com") || !seen_urls.insert(url.clone()) {
                continue;
            }

            let title = block
                .find('>')
                .map(|start| &block[start + 1..])
                .and_then(|rest| rest.find("</a>").map(|end| clean_text(&rest[..end])))
                .filter(|t| !t.is_empty())
                .or_else(|| extract_domain(&url))
                .unwrap_or_else(|| "Result".to_string());

            let snippet = block
                .find("result__snippet")
                .map(|start| &block[start..])
                .and_then(|rest| rest.find('>').map(|gt| &rest[gt + 1..]))
                .and_then(|rest| rest.find("</a>").or_else(|| rest.find("</div>")).map(|end| clean_text(&rest[..end])))
                .unwrap_or_default();

            results.push(SearchResult { title, url, snippet });
        }

        if results.is_empty() {
            for segment in html.split("uddg=").skip(1) {
                if results.len() >= self.max_results {
                    break;
                }
                let Some(end) = segment.find(['&', '"', '\'']) else {
                    continue;
                };
                let Ok(url) = urlencoding::decode(&segment[..end]) else {
                    continue;
                };
                let url = url.into_owned();
                if url.starts_with("http") && !url.contains("duckduckgo.com") && seen_urls.insert(url.clone()) {
                    results.push(SearchResult {
                        title: extract_domain(&url).unwrap_or_else(|| "Result".to_string()),
                        url,
                        snippet: String::new(),
                    });
                }
            }
        }

        results
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::BadRequest("empty query".to_string()));
        }

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let url = format!("{}/html/?q={}", self.base_url, urlencoding::encode(query));
        debug!(url = %url, "Fetching search results");

        let response = self.client.get(&url).send().await.map_err(SearchError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::HttpError(status.as_u16(), body));
        }

        let body = response.text().await.map_err(SearchError::from_reqwest)?;
        let results = self.parse_html(&body);

        if results.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = results.len(), "Search completed");
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Turn a result href into the destination URL.
fn resolve_href(href: &str) -> Option<String> {
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        let decoded = urlencoding::decode(encoded).ok()?.into_owned();
        return decoded.starts_with("http").then_some(decoded);
    }
    if href.starts_with("//") {
        return Some(format!("https:{}", href));
    }
    href.starts_with("http").then(|| href.replace("&amp;", "&"))
}

/// Strip tags and decode the handful of entities DuckDuckGo emits.
fn clean_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.example%2Fabout&amp;rut=abc">Acme Corp &amp; Friends - <b>About</b></a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.example%2Fabout">Acme is headquartered in <b>Springfield</b>.</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example%2Facme-raises&amp;rut=def">Acme raises $35M</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example%2Facme-raises">Series B led by Sequoia.</a>
</div>
<div class="result">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.example%2Fabout&amp;rut=ghi">Duplicate</a>
</div>
"#;

    fn tool(max_results: usize) -> DuckDuckGoSearch {
        DuckDuckGoSearch::new(max_results)
            .unwrap()
            .with_request_delay(Duration::ZERO)
    }

    #[test]
    fn test_parse_result_blocks() {
        let results = tool(5).parse_html(RESULTS_PAGE);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://acme.example/about");
        assert_eq!(results[0].title, "Acme Corp & Friends - About");
        assert_eq!(results[0].snippet, "Acme is headquartered in Springfield.");
        assert_eq!(results[1].url, "https://news.example/acme-raises");
    }

    #[test]
    fn test_parse_respects_max_results() {
        assert_eq!(tool(1).parse_html(RESULTS_PAGE).len(), 1);
    }

    #[test]
    fn test_parse_falls_back_to_uddg_links() {
        let html = r#"<a href="/l/?uddg=https%3A%2F%2Fwww.example.com%2Fpage&x=1">x</a>"#;
        let results = tool(5).parse_html(html);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://www.example.com/page");
        assert_eq!(results[0].title, "www.example.com");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.example.com/page"),
            Some("www.example.com".to_string())
        );
        assert_eq!(extract_domain("no-scheme"), None);
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "Acme Corp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let results = tool(5).with_base_url(server.uri()).search("Acme Corp").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_search_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = tool(5).with_base_url(server.uri()).search("Acme").await;
        assert!(matches!(result, Err(SearchError::RateLimited)));
    }

    #[tokio::test]
    async fn test_search_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = tool(5).with_base_url(server.uri()).search("Acme").await;
        assert!(matches!(result, Err(SearchError::HttpError(503, _))));
    }
}
