//! Terminal Display
//!
//! A predictor layer that echoes each accepted reasoning step to a terminal.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::predictor::Predictor;
use crate::reasoning::{PromptData, Reasoning};

/// Prints `Thought: "…" Action: "…" Input: "…"` or `Thought: "…" FinalAnswer: …`
/// in green, optionally behind a blue `[prefix]`. Write failures are only logged.
pub struct CliLogger<P> {
    inner: P,
    out: Mutex<Box<dyn Write + Send>>,
    prefix: Option<String>,
}

impl<P> CliLogger<P> {
    pub fn new(inner: P, out: impl Write + Send + 'static) -> Self {
        Self {
            inner,
            out: Mutex::new(Box::new(out)),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into()).filter(|p: &String| !p.is_empty());
        self
    }

    fn print<T: Serialize>(&self, reasoning: &Reasoning<T>) -> Result<()> {
        let line = match &reasoning.action {
            Some(action) => format!(
                "Thought: {:?} Action: {:?} Input: {:?}",
                reasoning.thought,
                action,
                reasoning.input.as_deref().unwrap_or_default()
            ),
            None => format!(
                "Thought: {:?} FinalAnswer: {}",
                reasoning.thought,
                render_answer(reasoning.final_answer.as_ref())?
            ),
        };

        let mut out = self
            .out
            .lock()
            .map_err(|_| AgentError::Other("display writer poisoned".into()))?;
        if let Some(prefix) = &self.prefix {
            write!(out, "{} ", format!("[{}]", prefix).blue())?;
        }
        writeln!(out, "{}", line.green())?;
        out.flush()?;
        Ok(())
    }
}

/// Strings print as-is, anything else as compact JSON
fn render_answer<T: Serialize>(answer: Option<&T>) -> Result<String> {
    match serde_json::to_value(answer)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[async_trait]
impl<T, P> Predictor<PromptData<T>, Reasoning<T>> for CliLogger<P>
where
    T: Serialize + Send + Sync,
    P: Predictor<PromptData<T>, Reasoning<T>>,
{
    async fn predict(&self, ctx: &Context, req: &PromptData<T>) -> Result<Reasoning<T>> {
        let reasoning = self.inner.predict(ctx, req).await?;
        if let Err(e) = self.print(&reasoning) {
            tracing::warn!(error = %e, "failed to display reasoning");
        }
        Ok(reasoning)
    }
}
