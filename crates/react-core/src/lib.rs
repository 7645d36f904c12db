//! # react-core
//!
//! Reason-then-act agent loop over a layered, provider-agnostic prediction pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌─────────────┐    ┌──────────────────────┐    ┌─────────────┐  │
//! │  │  Reasoning  │───▶│  Prediction Pipeline │───▶│ LlmProvider │  │
//! │  │    Loop     │    │ display/retry/valid. │    │ (Strategy)  │  │
//! │  └──────┬──────┘    └──────────────────────┘    └─────────────┘  │
//! │         │           ┌──────────────────────┐                     │
//! │         └──────────▶│    Tool Registry     │                     │
//! │                     └──────────────────────┘                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama, Vertex AI,
//! or any other backend without changing agent logic. `Pipeline` chains
//! typed stages (agents included) and checks them when it is assembled.

pub mod agent;
pub mod chain;
pub mod context;
pub mod display;
pub mod error;
pub mod parser;
pub mod predictor;
pub mod prompt;
pub mod prompter;
pub mod provider;
pub mod reasoning;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, AgentBuilder, AgentConfig};
pub use chain::{Chain, ChainFn, Pipeline, Stage};
pub use context::Context;
pub use error::{AgentError, Result};
pub use parser::{JsonParser, Parser, TextParser};
pub use predictor::{JsonLogger, LlmPredictor, Predictor, PredictorChain, Retrier};
pub use prompt::{default_parser, ReactPrompter};
pub use prompter::{Hydrated, Prompter};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{PromptData, Reasoning, ThoughtIteration};
pub use tool::{FnTool, Tool, ToolRegistry, ToolSchema};
