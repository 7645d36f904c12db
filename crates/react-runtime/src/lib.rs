//! # react-runtime
//!
//! Model backends and console plumbing for `react-core` agents.
//!
//! ## Providers
//!
//! - **Ollama** (default feature): local inference via `/api/generate`
//! - **Vertex AI**: publisher-model `:predict` over HTTPS
//!
//! ## Console
//!
//! [`Console`] is shared by the `user-input` tool and the confirmation
//! pipeline, so both read from the same line-buffered input.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use react_runtime::{ollama::OllamaProvider, Console, UserInputTool};
//!
//! let provider = Arc::new(OllamaProvider::localhost()?);
//! let console = Arc::new(Console::stdio());
//! let agent = Agent::<String>::builder()
//!     .predictor(base_predictor(provider))
//!     .tool(UserInputTool::new(console))
//!     .build()?;
//! ```

pub mod confirmation;
pub mod console;
pub mod user_input;
pub mod vertex;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use confirmation::{confirmation_chain, Confirmation};
pub use console::Console;
pub use user_input::UserInputTool;
pub use vertex::{VertexConfig, VertexProvider};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use react_core::{Agent, AgentError, Context, LlmProvider, Result, Tool, ToolRegistry};
