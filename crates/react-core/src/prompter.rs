//! Prompt Hydration
//!
//! A [`Prompter`] turns a typed request into the text handed to the model
//! together with the generation parameters for that call.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::provider::GenerationOptions;

/// A rendered prompt and the parameters to generate it with
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hydrated {
    pub prompt: String,
    pub options: GenerationOptions,
}

impl Hydrated {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// Renders a request into a prompt
#[async_trait]
pub trait Prompter<Req>: Send + Sync
where
    Req: Sync,
{
    /// Any error returned here is reported as [`AgentError::Hydrate`] and is
    /// never retried.
    async fn hydrate(&self, ctx: &Context, req: &Req) -> Result<Hydrated>;
}

/// A prompter backed by a synchronous render function and fixed parameters
pub struct FnPrompter<F> {
    render: F,
    options: GenerationOptions,
}

impl<F> FnPrompter<F> {
    pub fn new(options: GenerationOptions, render: F) -> Self {
        Self { render, options }
    }
}

#[async_trait]
impl<Req, F> Prompter<Req> for FnPrompter<F>
where
    Req: Sync,
    F: Fn(&Req) -> Result<String> + Send + Sync,
{
    async fn hydrate(&self, _ctx: &Context, req: &Req) -> Result<Hydrated> {
        let prompt = (self.render)(req)?;
        Ok(Hydrated::new(prompt, self.options.clone()))
    }
}

/// Writes every hydrated prompt to `out`, followed by a newline
pub struct LoggingPrompter<P> {
    inner: P,
    out: Mutex<Box<dyn Write + Send>>,
}

impl<P> LoggingPrompter<P> {
    pub fn new(inner: P, out: impl Write + Send + 'static) -> Self {
        Self {
            inner,
            out: Mutex::new(Box::new(out)),
        }
    }

    fn record(&self, prompt: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| AgentError::Other("prompt log writer poisoned".into()))?;
        writeln!(out, "{}", prompt)?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<Req, P> Prompter<Req> for LoggingPrompter<P>
where
    Req: Sync,
    P: Prompter<Req>,
{
    async fn hydrate(&self, ctx: &Context, req: &Req) -> Result<Hydrated> {
        let hydrated = self.inner.hydrate(ctx, req).await?;
        if let Err(e) = self.record(&hydrated.prompt) {
            tracing::warn!(error = %e, "failed to write prompt log");
        }
        Ok(hydrated)
    }
}
