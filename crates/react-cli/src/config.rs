//! Command-line configuration. Every flag can also come from the environment
//! (or a `.env` file, loaded before parsing).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use react_core::provider::GenerationOptions;
use react_runtime::vertex::DEFAULT_API_ENDPOINT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Ollama,
    Vertex,
}

impl Backend {
    fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2",
            Self::Vertex => "text-bison@001",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "react-cli",
    about = "Reason-then-act agent that edits a toy app template",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Model backend
    #[arg(long, env = "REACT_BACKEND", value_enum, default_value_t = Backend::Ollama, global = true)]
    pub backend: Backend,

    /// Model name; defaults to llama3.2 on Ollama and text-bison@001 on Vertex
    #[arg(long, env = "REACT_MODEL", global = true)]
    pub model: Option<String>,

    /// Maximum number of tokens to generate
    #[arg(long, env = "REACT_MAX_TOKENS", default_value_t = 1024, global = true)]
    pub max_tokens: u32,

    #[arg(long, env = "REACT_TEMPERATURE", default_value_t = 0.2, global = true)]
    pub temperature: f32,

    #[arg(long, env = "REACT_TOP_K", default_value_t = 40, global = true)]
    pub top_k: u32,

    #[arg(long, env = "REACT_TOP_P", default_value_t = 0.9, global = true)]
    pub top_p: f32,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost", global = true)]
    pub ollama_host: String,

    #[arg(long, env = "OLLAMA_PORT", default_value_t = 11434, global = true)]
    pub ollama_port: u16,

    /// Vertex AI API endpoint
    #[arg(long, env = "VERTEX_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT, global = true)]
    pub api_endpoint: String,

    /// GCP project for Vertex AI
    #[arg(long, env = "GCP_PROJECT_ID", global = true)]
    pub project_id: Option<String>,

    /// Bearer token for Vertex AI
    #[arg(long, env = "VERTEX_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Give up on a goal after this many model turns
    #[arg(long, env = "REACT_MAX_ITERATIONS", default_value_t = 20)]
    pub max_iterations: usize,

    /// Append every rendered prompt to this file
    #[arg(long, env = "REACT_PROMPT_LOG")]
    pub prompt_log: Option<PathBuf>,

    /// Append every prediction request and response to this file as JSON lines
    #[arg(long, env = "REACT_PREDICTIONS_LOG")]
    pub predictions_log: Option<PathBuf>,

    /// Append every model call to this file as JSON lines
    #[arg(long, env = "REACT_LLM_LOG", global = true)]
    pub llm_log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Edit the app template interactively (the default)
    Edit,

    /// Send one prompt straight to the model and print the reply
    Prompt {
        /// Prompt text, or @path to read it from a file
        text: String,
    },
}

impl Cli {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.backend.default_model().into()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
            stop_sequences: Vec::new(),
        }
    }
}
