//! Prediction Pipeline
//!
//! Every layer implements the same [`Predictor`] contract, so layers stack as
//! decorators, each owning the one it wraps:
//!
//! ```text
//!   JsonLogger ──▶ Retrier ──▶ ReasoningValidator ──▶ LlmPredictor
//!                  (3 tries)    (structure, tools)     (hydrate → generate → parse)
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use crate::chain::Chain;
use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::parser::Parser;
use crate::prompter::Prompter;
use crate::provider::LlmProvider;

/// Default attempt bound for [`Retrier`]
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Request in, response out, with the model somewhere underneath
#[async_trait]
pub trait Predictor<Req, Resp>: Send + Sync
where
    Req: Sync,
    Resp: Send,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp>;
}

#[async_trait]
impl<Req, Resp, P> Predictor<Req, Resp> for Arc<P>
where
    Req: Sync,
    Resp: Send,
    P: Predictor<Req, Resp> + ?Sized,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp> {
        (**self).predict(ctx, req).await
    }
}

#[async_trait]
impl<Req, Resp, P> Predictor<Req, Resp> for Box<P>
where
    Req: Sync,
    Resp: Send,
    P: Predictor<Req, Resp> + ?Sized,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp> {
        (**self).predict(ctx, req).await
    }
}

/// Runs a [`Predictor`] as a pipeline stage
pub struct PredictorChain<P>(P);

impl<P> PredictorChain<P> {
    pub fn new(predictor: P) -> Self {
        Self(predictor)
    }
}

#[async_trait]
impl<Req, Resp, P> Chain<Req, Resp> for PredictorChain<P>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
    P: Predictor<Req, Resp>,
{
    async fn run(&self, ctx: &Context, input: Req) -> Result<Resp> {
        self.0.predict(ctx, &input).await
    }
}

// ============================================================================
// Base predictor
// ============================================================================

/// Hydrates the request, asks the model, parses the answer.
///
/// Each step has its own error class: hydration failures become
/// [`AgentError::Hydrate`], backend failures [`AgentError::Llm`] and parse
/// failures [`AgentError::Parse`]. Cancellation passes through untouched.
pub struct LlmPredictor<Pr, Pa> {
    provider: Arc<dyn LlmProvider>,
    prompter: Pr,
    parser: Pa,
}

impl<Pr, Pa> LlmPredictor<Pr, Pa> {
    pub fn new(provider: Arc<dyn LlmProvider>, prompter: Pr, parser: Pa) -> Self {
        Self {
            provider,
            prompter,
            parser,
        }
    }
}

#[async_trait]
impl<Req, Resp, Pr, Pa> Predictor<Req, Resp> for LlmPredictor<Pr, Pa>
where
    Req: Sync,
    Resp: Send,
    Pr: Prompter<Req>,
    Pa: Parser<Resp>,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp> {
        let hydrated = self
            .prompter
            .hydrate(ctx, req)
            .await
            .map_err(|e| match e {
                AgentError::Hydrate(_) | AgentError::Cancelled | AgentError::DeadlineExceeded => e,
                other => AgentError::Hydrate(other.to_string()),
            })?;

        let completion = ctx
            .guard(self.provider.generate(&hydrated.prompt, &hydrated.options))
            .await?
            .map_err(|e| match e {
                AgentError::Llm(_) | AgentError::Cancelled | AgentError::DeadlineExceeded => e,
                other => AgentError::Llm(other.to_string()),
            })?;

        tracing::debug!(
            model = %completion.model,
            chars = completion.content.len(),
            "model responded"
        );

        self.parser.parse(&completion.content).map_err(|e| match e {
            AgentError::Parse(_) => e,
            other => AgentError::Parse(other.to_string()),
        })
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Retries model and parse failures; everything else is returned at once
pub struct Retrier<P> {
    inner: P,
    max_attempts: usize,
}

impl<P> Retrier<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt bound. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

#[async_trait]
impl<Req, Resp, P> Predictor<Req, Resp> for Retrier<P>
where
    Req: Sync,
    Resp: Send,
    P: Predictor<Req, Resp>,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp> {
        let mut attempt = 1;
        loop {
            match self.inner.predict(ctx, req).await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "prediction failed, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

// ============================================================================
// JSON logging
// ============================================================================

#[derive(Serialize)]
struct RequestLine<'a, T> {
    request: &'a T,
}

#[derive(Serialize)]
struct ResponseLine<'a, T> {
    response: &'a T,
}

/// Writes `{"request": …}` before and `{"response": …}` after each
/// successful prediction, one JSON document per line. Failed predictions only
/// leave the request line behind.
pub struct JsonLogger<P> {
    inner: P,
    out: Mutex<Box<dyn Write + Send>>,
}

impl<P> JsonLogger<P> {
    pub fn new(inner: P, out: impl Write + Send + 'static) -> Self {
        Self {
            inner,
            out: Mutex::new(Box::new(out)),
        }
    }

    fn write_line<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| AgentError::Other("prediction log writer poisoned".into()))?;
        serde_json::to_writer(&mut *out, value)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<Req, Resp, P> Predictor<Req, Resp> for JsonLogger<P>
where
    Req: Serialize + Sync,
    Resp: Serialize + Send,
    P: Predictor<Req, Resp>,
{
    async fn predict(&self, ctx: &Context, req: &Req) -> Result<Resp> {
        if let Err(e) = self.write_line(&RequestLine { request: req }) {
            tracing::warn!(error = %e, "failed to write prediction log");
        }
        let resp = self.inner.predict(ctx, req).await?;
        if let Err(e) = self.write_line(&ResponseLine { response: &resp }) {
            tracing::warn!(error = %e, "failed to write prediction log");
        }
        Ok(resp)
    }
}
