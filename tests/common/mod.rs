//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use company_research_agent::llm::{LLMConfig, LLMProvider, LLMResponse};
use company_research_agent::tools::ToolDefinition;
use company_research_agent::{
    Message, Orchestrator, PageFetcher, ResearchError, ScrapeError, SearchError, SearchProvider, SearchResult,
    ToolCall,
};

/// One model request as the fake saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Replays canned replies in order.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Message>>,
    pub requests: Mutex<Vec<Recorded>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError> {
        self.requests.lock().unwrap().push(Recorded {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ResearchError::Llm("script exhausted".to_string()))?;
        Ok(LLMResponse::new(reply))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }
}

type Responder = dyn Fn(&[Message], &[ToolDefinition]) -> Message + Send + Sync;

/// Answers from a function of the request; safe under concurrent sessions.
pub struct FnLlm {
    respond: Box<Responder>,
}

impl FnLlm {
    pub fn new(respond: impl Fn(&[Message], &[ToolDefinition]) -> Message + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
        })
    }
}

#[async_trait]
impl LLMProvider for FnLlm {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ResearchError> {
        Ok(LLMResponse::new((self.respond)(messages, tools)))
    }

    fn name(&self) -> &str {
        "fn"
    }

    fn default_model(&self) -> &str {
        "fn-1"
    }
}

/// Returns the same hits for every query and remembers the queries.
#[derive(Default)]
pub struct StaticSearch {
    pub results: Vec<SearchResult>,
    pub queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Arc<Self> {
        Arc::new(Self {
            results,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Serves fixed page text for every URL.
pub struct StaticFetcher {
    pub page: String,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(page: &str) -> Arc<Self> {
        Arc::new(Self {
            page: page.to_string(),
            fetched: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(self.page.clone())
    }
}

pub fn orchestrator(llm: Arc<dyn LLMProvider>) -> Orchestrator {
    Orchestrator::new(llm, StaticSearch::new(Vec::new()), StaticFetcher::new(""))
}

pub fn tool_call(id: &str, name: &str, args: Value) -> Message {
    Message::assistant_with_tool_calls("", vec![ToolCall::new(id, name, args)])
}

pub fn verdict(good: bool, reason: &str) -> Message {
    tool_call("judge", "Judgment", serde_json::json!({ "reason": reason, "good": good }))
}
