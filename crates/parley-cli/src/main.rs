//! parley: interactive chat with a tool-calling model.
//!
//! Loads the TOML config, connects the Claude backend, optionally serves a
//! local document directory as a tool session, and runs a REPL on stdin.

mod cli;
mod docs;
mod repl;
mod sink;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parley_ai::{ClaudeClient, ClaudeConfig, ModelBackend, Orchestrator, ToolInvoker, ToolSession};
use parley_common::ParleyError;
use parley_config::{config_to_json, ParleyConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::docs::DocsSession;
use crate::repl::Repl;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("parley: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ParleyError> {
    let mut config = match &args.config {
        Some(path) => parley_config::load_config_from(path)?,
        None => parley_config::load_config()?,
    };
    if let Some(model) = &args.model {
        config.model.model = model.clone();
    }

    init_logging(args.log_level.as_deref(), &config);

    if args.print_config {
        println!("{}", config_to_json(&config));
        return Ok(());
    }

    let claude = ClaudeConfig::from_env()
        .map_err(|e| ParleyError::Backend(e.to_string()))?
        .with_model(&config.model.model)
        .with_max_tokens(config.model.max_tokens)
        .with_temperature(config.model.temperature);
    let backend: Arc<dyn ModelBackend> =
        Arc::new(ClaudeClient::new(claude).map_err(|e| ParleyError::Backend(e.to_string()))?);

    let orchestrator = build_orchestrator(backend, &config, &args)?;
    let streaming = config.conversation.streaming && !args.no_stream;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Repl::new(orchestrator, streaming).run(stdin).await
}

fn build_orchestrator(
    backend: Arc<dyn ModelBackend>,
    config: &ParleyConfig,
    args: &Args,
) -> Result<Orchestrator, ParleyError> {
    let conversation = &config.conversation;
    let invoker = ToolInvoker::new()
        .with_timeout(Duration::from_secs(conversation.tool_timeout_secs))
        .with_parallel(conversation.parallel_tools);

    let mut orchestrator = Orchestrator::new(backend)
        .with_invoker(invoker)
        .with_max_tool_rounds(conversation.max_tool_rounds)
        .with_default_prompt_argument(&conversation.default_prompt_argument)
        .with_resource_mentions(conversation.resource_mentions);

    if let Some(system) = &config.model.system_prompt {
        orchestrator = orchestrator.with_system_prompt(system);
    }

    if let Some(dir) = &args.docs {
        let docs = DocsSession::open(dir)?;
        tracing::info!(root = %docs.root().display(), "Serving documents");
        let docs: Arc<dyn ToolSession> = Arc::new(docs);
        orchestrator = orchestrator
            .with_session(Arc::clone(&docs))
            .with_prompt_session(Arc::clone(&docs))
            .with_resource_session(docs);
    }

    Ok(orchestrator)
}

/// `--log-level` wins over `RUST_LOG`, which wins over the config file.
fn init_logging(cli_level: Option<&str>, config: &ParleyConfig) {
    let filter = match cli_level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = config.logging.level.as_directive();
            EnvFilter::new(format!("parley={level},parley_ai={level},parley_config={level}"))
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
