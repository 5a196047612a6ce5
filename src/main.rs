//! # Company Research Agent
//!
//! Command-line front end: researches companies, looks up single fields
//! about an entity, or fills the missing cells of an enrichment table.
//!
//! ## Quick Start
//! ```bash
//! export ANTHROPIC_API_KEY=...
//! company-research-agent company "Acme Corp"
//! company-research-agent lookup --target ceo --info target="Acme Corp"
//! company-research-agent enrich table.json --write
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use company_research_agent::{
    build_provider, Config, DuckDuckGoSearch, EnrichmentTable, Enricher, HttpPageFetcher, LLMConfig, ModelProvider,
    Orchestrator, RunRequest, SearchBackend, SearchError, SearchProvider, TavilySearch,
};

#[derive(Parser, Debug)]
#[command(
    name = "company-research-agent",
    version,
    about = "Researches structured facts about companies with web search, scraping and a self-check loop",
    long_about = r#"
Company Research Agent

The model searches the web, scrapes pages into notes and proposes an answer.
A second model pass judges the proposal; rejected answers go back to the
model with feedback until an answer is accepted.

ENVIRONMENT:
  LLM_PROVIDER        anthropic (default), openai or ollama
  ANTHROPIC_API_KEY   / OPENAI_API_KEY for the hosted providers
  SEARCH_PROVIDER     tavily or duckduckgo (tavily if TAVILY_API_KEY is set)
  MAX_ITERATIONS      model turns per session before giving up (default 25)

EXAMPLES:
  company-research-agent company "Acme Corp" "Globex"
  company-research-agent lookup --target ceo --info target="Acme Corp"
  company-research-agent -p ollama -m llama3.2 enrich table.json --write
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Model to use (overrides LLM_MODEL)
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// LLM provider: anthropic, openai or ollama (overrides LLM_PROVIDER)
    #[arg(short = 'p', long = "provider", global = true)]
    provider: Option<ModelProvider>,

    /// Search backend: tavily or duckduckgo (overrides SEARCH_PROVIDER)
    #[arg(long = "search", global = true)]
    search: Option<SearchBackend>,

    /// Model turns allowed per session (overrides MAX_ITERATIONS)
    #[arg(long = "max-iterations", global = true)]
    max_iterations: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill the company profile for one or more companies
    Company {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Look up a single field about an entity
    Lookup {
        /// Field to find, e.g. `ceo`
        #[arg(short = 't', long = "target")]
        target: String,

        /// Known facts as key=value, e.g. --info target="Acme Corp"
        #[arg(short = 'i', long = "info", value_parser = parse_key_val)]
        info: Vec<(String, String)>,
    },

    /// Research every pending cell of an enrichment table
    Enrich {
        /// Table JSON file
        #[arg(value_name = "TABLE")]
        table: PathBuf,

        /// Add a column before enriching
        #[arg(long = "add-column")]
        add_columns: Vec<String>,

        /// Add a target row before enriching
        #[arg(long = "add-target")]
        add_targets: Vec<String>,

        /// Retry cells that failed in a previous run
        #[arg(long = "retry-failed", default_value = "false")]
        retry_failed: bool,

        /// Write the updated table back instead of printing it
        #[arg(short = 'w', long = "write", default_value = "false")]
        write: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    init_logging(args.verbose, &config.log_level)?;

    if let Some(model) = args.model {
        info!(model = %model, "Using model from command line");
        config.model = Some(model);
    }
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(search) = args.search {
        config.search_backend = search;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }

    config.validate()?;

    info!(
        provider = %config.provider,
        model = %config.effective_model(),
        search = %config.search_backend,
        max_iterations = config.max_iterations,
        "Configuration loaded"
    );

    let result = run(args.command, &config).await;

    if let Err(e) = &result {
        error!(error = %e, "Research failed");
        eprintln!("\nResearch failed: {:#}", e);
        print_hint(&format!("{:#}", e), &config);
    }

    result
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    match command {
        Command::Company { names } => {
            let requests: Vec<RunRequest> = names.iter().map(RunRequest::company).collect();
            let results = orchestrator.run_many(&requests, config.concurrency).await;

            let mut failures = 0;
            for (name, result) in names.iter().zip(results) {
                match result {
                    Ok(output) => println!("{}", serde_json::to_string_pretty(&json!({ "company_name": name, "result": output }))?),
                    Err(e) => {
                        failures += 1;
                        error!(company = %name, error = %e, "Company research failed");
                        println!("{}", serde_json::to_string_pretty(&json!({ "company_name": name, "error": e.to_string() }))?);
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} companies failed", failures, names.len());
            }
        }

        Command::Lookup { target, info } => {
            let input_info: Map<String, Value> = info.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            let output = orchestrator
                .run(&RunRequest::target(input_info, target))
                .await
                .context("Lookup failed")?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Enrich {
            table: path,
            add_columns,
            add_targets,
            retry_failed,
            write,
        } => {
            let mut table = EnrichmentTable::load(&path)
                .with_context(|| format!("Failed to load table {}", path.display()))?;

            for column in &add_columns {
                table.add_column(column)?;
            }
            for target in &add_targets {
                table.add_target(target)?;
            }
            if retry_failed {
                let reset = table.reset_failed();
                info!(cells = reset, "Retrying failed cells");
            }

            let summary = Enricher::new(orchestrator, config.concurrency).run(&mut table).await;
            eprintln!("Filled {} cell(s), {} failed", summary.filled, summary.failed);

            if write {
                table
                    .save(&path)
                    .with_context(|| format!("Failed to write table {}", path.display()))?;
                info!(path = %path.display(), "Table written");
            } else {
                println!("{}", serde_json::to_string_pretty(&table)?);
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let llm = build_provider(config)?;

    let search: Arc<dyn SearchProvider> = match config.search_backend {
        SearchBackend::Tavily => {
            let key = config
                .tavily_api_key
                .clone()
                .ok_or_else(|| {
                    SearchError::NotConfigured("TAVILY_API_KEY environment variable not set".to_string())
                })?;
            Arc::new(TavilySearch::new(key, config.max_search_results))
        }
        SearchBackend::DuckDuckGo => Arc::new(DuckDuckGoSearch::new(config.max_search_results)?),
    };

    let fetcher = Arc::new(HttpPageFetcher::new(config.scrape_max_chars)?);

    let llm_config = LLMConfig::new()
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    Ok(Orchestrator::new(llm, search, fetcher)
        .with_max_iterations(config.max_iterations)
        .with_config(llm_config))
}

/// Suggestions for the failures people hit first.
fn print_hint(message: &str, config: &Config) {
    if message.contains("ANTHROPIC_API_KEY") || message.contains("OPENAI_API_KEY") {
        eprintln!("\nTip: export the API key for the {} provider, or put it in a .env file", config.provider);
    } else if message.contains("TAVILY_API_KEY") {
        eprintln!("\nTip: set TAVILY_API_KEY, or use --search duckduckgo");
    } else if message.to_lowercase().contains("connection refused") && config.provider == ModelProvider::Ollama {
        eprintln!("\nTip: make sure Ollama is running:");
        eprintln!("   ollama serve");
    } else if message.contains("did not converge") {
        eprintln!("\nTip: raise --max-iterations or try a stronger model");
    }
}

/// Logs go to stderr so stdout carries only JSON results.
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_args() {
        let args = Args::parse_from(["test", "company", "Acme Corp", "Globex"]);
        match args.command {
            Command::Company { names } => assert_eq!(names, vec!["Acme Corp", "Globex"]),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!args.verbose);
    }

    #[test]
    fn test_lookup_args_with_global_flags() {
        let args = Args::parse_from([
            "test",
            "lookup",
            "--target",
            "ceo",
            "--info",
            "target=Acme Corp",
            "-p",
            "ollama",
            "-m",
            "llama3.2",
            "--verbose",
        ]);

        assert_eq!(args.provider, Some(ModelProvider::Ollama));
        assert_eq!(args.model.as_deref(), Some("llama3.2"));
        assert!(args.verbose);
        match args.command {
            Command::Lookup { target, info } => {
                assert_eq!(target, "ceo");
                assert_eq!(info, vec![("target".to_string(), "Acme Corp".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_enrich_args() {
        let args = Args::parse_from(["test", "enrich", "table.json", "--write", "--add-column", "ceo"]);
        match args.command {
            Command::Enrich {
                table,
                add_columns,
                write,
                retry_failed,
                ..
            } => {
                assert_eq!(table, PathBuf::from("table.json"));
                assert_eq!(add_columns, vec!["ceo"]);
                assert!(write);
                assert!(!retry_failed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("website=https://acme.example/?a=b").unwrap(),
            ("website".to_string(), "https://acme.example/?a=b".to_string())
        );
        assert!(parse_key_val("no-separator").is_err());
        assert!(parse_key_val("=value").is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        assert!(Args::try_parse_from(["test", "-p", "gemini", "company", "Acme"]).is_err());
    }
}
