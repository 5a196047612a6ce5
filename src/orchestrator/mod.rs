//! Research session control loop
//!
//! ```text
//!            ┌──────────── tool result ─────────────┐
//!            ▼                                      │
//!   ──▶  Propose ── one Search/Scrape call ──▶  Dispatch
//!         ▲  │ ▲
//!         │  │ └──── corrective message ───── Reject ◀── zero or ≥2 calls
//!         │  │
//!         │  └── one Info call ──▶ Validate ── good + coercible ──▶ Terminate
//!         │                           │
//!         └── judge reason / coercion error
//! ```
//!
//! Every transition only appends to the session transcript, so dropping a
//! session future between two awaits never leaves it half-written.

mod checker;
mod request;
mod route;

pub use checker::{judgment_definition, parse_judgment, Judgment, JUDGMENT_TOOL};
pub use request::{ResearchOutput, RunRequest, Subject};
pub use route::{route_after_propose, Route};

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, TokenUsage};
use crate::prompts::{self, ONE_TOOL_CALL_REQUIRED};
use crate::schema::{Record, Schema};
use crate::tools::{
    format_results, research_tools, PageFetcher, ScrapeArgs, SearchArgs, SearchProvider, ToolDefinition,
    WebsiteScraper, SCRAPE_TOOL, SEARCH_TOOL,
};
use crate::transcript::{Message, ToolCall, Transcript};

/// Model turns allowed per session unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub output: ResearchOutput,
    pub transcript: Transcript,
    /// Summed over research and judge calls
    pub usage: TokenUsage,
    pub model_turns: usize,
}

#[derive(Debug)]
enum Step {
    Propose,
    Dispatch(ToolCall),
    Validate(ToolCall),
    Reject,
    Terminate(Record),
}

/// Per-session mutable state; never shared between sessions.
#[derive(Default)]
struct Session {
    transcript: Transcript,
    usage: TokenUsage,
    model_turns: usize,
}

impl Session {
    fn record_usage(&mut self, usage: Option<TokenUsage>) {
        if let Some(usage) = usage {
            self.usage += usage;
        }
    }
}

/// Drives research sessions against shared collaborators.
///
/// The orchestrator holds no per-session state, so one instance can run any
/// number of sessions at once.
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::new(llm, search, fetcher).with_max_iterations(10);
/// let output = orchestrator.run(&RunRequest::company("Acme Corp")).await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    llm: Arc<dyn LLMProvider>,
    search: Arc<dyn SearchProvider>,
    scraper: WebsiteScraper,
    max_iterations: usize,
    config: Option<LLMConfig>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            scraper: WebsiteScraper::new(fetcher, llm.clone()),
            llm,
            search,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            config: None,
        }
    }

    /// Cap on model turns before the session is aborted
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set LLM configuration for all calls, page summaries included
    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.scraper = self.scraper.with_llm_config(config.clone());
        self.config = Some(config);
        self
    }

    pub async fn run(&self, request: &RunRequest) -> Result<ResearchOutput, ResearchError> {
        Ok(self.run_with_report(request).await?.output)
    }

    /// Run one session to completion and keep its transcript.
    pub async fn run_with_report(&self, request: &RunRequest) -> Result<ResearchReport, ResearchError> {
        let schema = request.schema()?;
        let main_prompt = prompts::main_prompt(&schema, request.known_info());
        let tools = research_tools(&schema);
        let mut session = Session::default();

        info!(
            subject = %request.label(),
            fields = ?schema.field_names(),
            provider = %self.llm.name(),
            model = %self.llm.default_model(),
            search = %self.search.name(),
            "Starting research"
        );

        let mut step = Step::Propose;
        loop {
            step = match step {
                Step::Propose => {
                    if session.model_turns >= self.max_iterations {
                        warn!(subject = %request.label(), limit = self.max_iterations, "Iteration limit reached");
                        return Err(ResearchError::IterationLimit {
                            limit: self.max_iterations,
                        });
                    }
                    session.model_turns += 1;

                    let message = self.propose(&main_prompt, &tools, &mut session).await?;
                    let route = route_after_propose(&message);
                    session.transcript.push(message);

                    match route {
                        Route::Dispatch(call) => Step::Dispatch(call),
                        Route::Validate(call) => Step::Validate(call),
                        Route::Reject => Step::Reject,
                    }
                }
                Step::Dispatch(call) => {
                    let content = self.dispatch(&schema, &call).await?;
                    session.transcript.push(Message::tool(&content, &call.id));
                    Step::Propose
                }
                Step::Reject => {
                    debug!(iteration = session.model_turns, "Model did not make exactly one tool call");
                    session.transcript.push(Message::user(ONE_TOOL_CALL_REQUIRED));
                    Step::Propose
                }
                Step::Validate(call) => self.validate(&main_prompt, &schema, call, &mut session).await?,
                Step::Terminate(record) => {
                    info!(
                        subject = %request.label(),
                        model_turns = session.model_turns,
                        total_tokens = session.usage.total_tokens,
                        "Research complete"
                    );
                    return Ok(ResearchReport {
                        output: request.finish(record),
                        transcript: session.transcript,
                        usage: session.usage,
                        model_turns: session.model_turns,
                    });
                }
            };
        }
    }

    /// Run several sessions concurrently, at most `concurrency` at a time.
    ///
    /// Results come back in request order; one failed session does not
    /// affect the others.
    pub async fn run_many(
        &self,
        requests: &[RunRequest],
        concurrency: usize,
    ) -> Vec<Result<ResearchOutput, ResearchError>> {
        let mut results: Vec<(usize, Result<ResearchOutput, ResearchError>)> = stream::iter(requests.iter().enumerate())
            .map(|(index, request)| async move { (index, self.run(request).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Ask the model for its next action.
    async fn propose(
        &self,
        main_prompt: &str,
        tools: &[ToolDefinition],
        session: &mut Session,
    ) -> Result<Message, ResearchError> {
        let history = session.transcript.messages();
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::user(main_prompt));
        messages.extend_from_slice(history);

        debug!(iteration = session.model_turns, messages = messages.len(), "Calling model");
        let response = self.llm.complete(&messages, tools, self.config.as_ref()).await?;
        session.record_usage(response.usage);

        Ok(response.message)
    }

    /// Execute a non-finalize tool call and return the tool message content.
    async fn dispatch(&self, schema: &Schema, call: &ToolCall) -> Result<String, ResearchError> {
        info!(tool = %call.name, id = %call.id, "Dispatching tool call");

        match call.name.as_str() {
            SEARCH_TOOL => match serde_json::from_value::<SearchArgs>(call.arguments.clone()) {
                Ok(args) => {
                    let results = self.search.search(&args.query).await?;
                    Ok(format_results(&args.query, &results))
                }
                Err(e) => Ok(invalid_arguments(SEARCH_TOOL, &e)),
            },
            SCRAPE_TOOL => match serde_json::from_value::<ScrapeArgs>(call.arguments.clone()) {
                Ok(args) => self.scraper.scrape(schema, &args.url).await,
                Err(e) => Ok(invalid_arguments(SCRAPE_TOOL, &e)),
            },
            other => {
                warn!(tool = %other, "Model called an unknown tool");
                Ok(format!(
                    "Error: {} is not a valid tool, try one of [{}, {}, {}].",
                    other,
                    SEARCH_TOOL,
                    SCRAPE_TOOL,
                    schema.title()
                ))
            }
        }
    }

    /// Judge a finalize proposal, then coerce it.
    async fn validate(
        &self,
        main_prompt: &str,
        schema: &Schema,
        call: ToolCall,
        session: &mut Session,
    ) -> Result<Step, ResearchError> {
        // Everything but the proposal itself, which the checker prompt restates
        let history = session.transcript.messages();
        let prior = &history[..history.len().saturating_sub(1)];

        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(Message::user(main_prompt));
        messages.extend_from_slice(prior);
        messages.push(Message::user(&prompts::checker_prompt(&call.arguments)));

        let response = self
            .llm
            .complete(&messages, &[judgment_definition()], self.config.as_ref())
            .await?;
        session.record_usage(response.usage);
        let judgment = parse_judgment(&response.message).unwrap_or_else(|e| {
            warn!(error = %e, "Judge gave no readable verdict, treating proposal as rejected");
            Judgment {
                reason: String::new(),
                good: false,
            }
        });

        if !judgment.good {
            info!(reason = %judgment.reason, "Proposal judged insufficient");
            let feedback = if judgment.reason.trim().is_empty() {
                "The proposed info was judged insufficient. Keep researching."
            } else {
                judgment.reason.as_str()
            };
            session.transcript.push(Message::tool(feedback, &call.id));
            return Ok(Step::Propose);
        }

        match schema.coerce(&call.arguments) {
            Ok(record) => Ok(Step::Terminate(record)),
            Err(e) => {
                info!(error = %e, "Accepted proposal failed coercion");
                session
                    .transcript
                    .push(Message::tool(&format!("Invalid response: {}", e), &call.id));
                Ok(Step::Propose)
            }
        }
    }
}

fn invalid_arguments(tool: &str, error: &serde_json::Error) -> String {
    format!("Error: invalid arguments for {}: {}", tool, error)
}
