//! react-cli
//!
//! Interactive ReAct agent over a toy app editor.
//!
//! Commands:
//! - `edit`: ask for a goal, let the agent work on it, repeat (default)
//! - `prompt`: send one prompt to the model and print the reply

mod config;
mod toy_tools;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use react_core::{
    predictor::{JsonLogger, LlmPredictor, Predictor},
    prompt::{default_parser, ReactPrompter},
    prompter::LoggingPrompter,
    provider::{GenerationOptions, LlmProvider, LoggingProvider},
    reasoning::{PromptData, Reasoning},
    tool::Tool,
    Agent, Context,
};
use react_runtime::{
    ollama::{OllamaConfig, OllamaProvider},
    Console, VertexConfig, VertexProvider,
};

use crate::config::{Backend, Cli, Command};

type DynPredictor = Box<dyn Predictor<PromptData<String>, Reasoning<String>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before clap reads it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let provider = build_provider(&cli).await?;
    let options = cli.generation_options();

    match &cli.command {
        Some(Command::Prompt { text }) => run_prompt(provider.as_ref(), &options, text).await,
        Some(Command::Edit) | None => run_editor(&cli, provider, options).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn open_log(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

async fn build_provider(cli: &Cli) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match cli.backend {
        Backend::Ollama => {
            let provider = OllamaProvider::from_config(OllamaConfig {
                host: cli.ollama_host.clone(),
                port: cli.ollama_port,
                ..Default::default()
            })?;

            // Verify Ollama connection
            if provider.health_check().await.unwrap_or(false) {
                tracing::info!("✓ Connected to Ollama at {}:{}", cli.ollama_host, cli.ollama_port);
            } else {
                tracing::warn!("⚠ Ollama not available - agent will fail");
                tracing::warn!("  Make sure Ollama is running: ollama serve");
            }
            Arc::new(provider)
        }
        Backend::Vertex => {
            let Some(project_id) = cli.project_id.clone().filter(|p| !p.is_empty()) else {
                bail!("you must set the project-id flag or GCP_PROJECT_ID environment variable");
            };
            if cli.api_key.is_none() {
                tracing::warn!("⚠ No Vertex API key set - requests will be unauthenticated");
            }
            Arc::new(VertexProvider::from_config(VertexConfig {
                api_endpoint: cli.api_endpoint.clone(),
                project_id,
                api_key: cli.api_key.clone(),
                ..Default::default()
            })?)
        }
    };

    match &cli.llm_log {
        Some(path) => {
            tracing::info!("Logging model calls to {}", path.display());
            Ok(Arc::new(LoggingProvider::new(provider, open_log(path)?)))
        }
        None => Ok(provider),
    }
}

async fn run_prompt(
    provider: &dyn LlmProvider,
    options: &GenerationOptions,
    text: &str,
) -> anyhow::Result<()> {
    // @path reads the prompt from a file
    let prompt = match text.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read file {}", path))?,
        None => text.to_string(),
    };

    let completion = provider.generate(&prompt, options).await?;
    println!("{}", completion.content);
    Ok(())
}

fn build_predictor(
    cli: &Cli,
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
) -> anyhow::Result<DynPredictor> {
    let prompter = ReactPrompter::new(options);

    let mut predictor: DynPredictor = match &cli.prompt_log {
        Some(path) => {
            tracing::info!("Logging prompts to {}", path.display());
            Box::new(LlmPredictor::new(
                provider,
                LoggingPrompter::new(prompter, open_log(path)?),
                default_parser::<String>(),
            ))
        }
        None => Box::new(LlmPredictor::new(provider, prompter, default_parser::<String>())),
    };

    if let Some(path) = &cli.predictions_log {
        tracing::info!("Logging predictions to {}", path.display());
        predictor = Box::new(JsonLogger::new(predictor, open_log(path)?));
    }

    Ok(predictor)
}

async fn run_editor(
    cli: &Cli,
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
) -> anyhow::Result<()> {
    let console = Arc::new(Console::stdio());
    let tools = toy_tools::tool_set(
        provider.clone(),
        console.clone(),
        options.clone(),
        Arc::default(),
    )?;

    tracing::info!("Registered {} tools:", tools.len());
    for tool in &tools {
        tracing::info!("  • {}", tool.schema().name);
    }

    let agent = Agent::<String>::builder()
        .predictor(build_predictor(cli, provider, options)?)
        .tools(tools)
        .display(std::io::stderr())
        .max_iterations(cli.max_iterations)
        .build()?;

    loop {
        let goal = match console.ask(&Context::new(), "AI: What is the goal?\nYou: ").await {
            Ok(goal) => goal,
            Err(e) => {
                tracing::debug!("input closed: {}", e);
                return Ok(());
            }
        };
        if goal.trim().is_empty() {
            continue;
        }

        // Ctrl-C abandons the current goal, not the session
        let ctx = Context::new();
        let cancel = ctx.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let result = agent.run(&ctx, &goal).await;
        interrupt.abort();

        match result {
            Ok(answer) => console.say(&format!("{}\n", answer)).await?,
            Err(e) => {
                tracing::error!(error = %e, "agent run failed");
                console.say(&format!("{}\n", e.user_message())).await?;
            }
        }
    }
}
