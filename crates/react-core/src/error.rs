//! Error Types
//!
//! Every failure in the prediction pipeline and agent loop is classified here.
//! The class decides what happens next: retried by [`Retrier`](crate::predictor::Retrier),
//! absorbed by the agent loop as an observation, or returned to the caller.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Prompt template could not be rendered. Never retried.
    #[error("failed to hydrate prompt: {0}")]
    Hydrate(String),

    /// The language model backend call failed. Retried.
    #[error("failed to obtain response from LLM: {0}")]
    Llm(String),

    /// The response did not decode or failed structural validation. Retried.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The model named an action that is not in the tool registry.
    ///
    /// Carries the rejected reasoning so the agent loop can show it back to
    /// the model together with the error.
    #[error("invalid tool: {action:?}")]
    InvalidTool {
        action: String,
        thought: String,
        input: Option<String>,
    },

    /// Input handed to a tool did not satisfy its requirements
    #[error("invalid tool input: {0}")]
    InvalidToolInput(String),

    /// Tool execution failed
    #[error("{0}")]
    ToolExecution(String),

    /// Malformed tool set or pipeline assembly
    #[error("configuration error: {0}")]
    Config(String),

    /// The goal handed to the agent was empty
    #[error("goal is empty")]
    EmptyGoal,

    /// Maximum iterations reached in reasoning loop
    #[error("maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// The run was cancelled through its context
    #[error("operation cancelled")]
    Cancelled,

    /// The run's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable.
    ///
    /// Only model-call and parse failures are worth another attempt; everything
    /// else either cannot improve on retry or is handled by the agent loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Llm(_) | AgentError::Parse(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Hydrate(_) => "The prompt template could not be rendered.".into(),
            AgentError::Llm(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::Parse(_) => "The AI service kept returning responses that could not be understood.".into(),
            AgentError::InvalidTool { action, .. } => format!("The tool '{}' is not available.", action),
            AgentError::InvalidToolInput(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::Config(msg) => format!("The agent is misconfigured: {}", msg),
            AgentError::EmptyGoal => "Please provide a goal.".into(),
            AgentError::MaxIterations(_) => "The request took too long to process. Please try a simpler goal.".into(),
            AgentError::Cancelled => "The request was cancelled.".into(),
            AgentError::DeadlineExceeded => "The request timed out.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
