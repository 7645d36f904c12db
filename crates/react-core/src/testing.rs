//! Test Doubles
//!
//! Scripted stand-ins for the model backend and the predictor stack. Enabled
//! for other crates through the `testing` feature.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::predictor::Predictor;
use crate::provider::{Completion, GenerationOptions, LlmProvider};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory writer whose contents can be inspected through any clone
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock(&self.0)).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A writer whose every write fails
#[derive(Clone, Copy, Debug, Default)]
pub struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "writer closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "writer closed"))
    }
}

enum Script {
    Always(String),
    Failing(String),
    Queue(Mutex<VecDeque<Result<String>>>),
    Hang,
}

/// A model backend that replays canned responses and records prompts
pub struct FakeProvider {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers every prompt with `text`
    pub fn always(text: impl Into<String>) -> Self {
        Self::with_script(Script::Always(text.into()))
    }

    /// Fails every call with an [`AgentError::Llm`]
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with_script(Script::Failing(msg.into()))
    }

    /// Replays `responses` in order, then fails
    pub fn scripted<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String>>,
    {
        Self::with_script(Script::Queue(Mutex::new(responses.into_iter().collect())))
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self::with_script(Script::Hang)
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        lock(&self.prompts).push(prompt.to_string());

        let text = match &self.script {
            Script::Always(text) => text.clone(),
            Script::Failing(msg) => return Err(AgentError::Llm(msg.clone())),
            Script::Queue(queue) => {
                let next = lock(queue).pop_front();
                next.unwrap_or_else(|| Err(AgentError::Llm("no more scripted responses".into())))?
            }
            Script::Hang => std::future::pending::<String>().await,
        };

        Ok(Completion::text(text, options.model.clone()))
    }
}

/// A predictor that replays canned results and records every request
pub struct FakePredictor<Req, Resp> {
    responses: Mutex<VecDeque<Result<Resp>>>,
    requests: Mutex<Vec<Req>>,
}

impl<Req, Resp> FakePredictor<Req, Resp> {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<Resp>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl<Req: Clone, Resp> FakePredictor<Req, Resp> {
    pub fn requests(&self) -> Vec<Req> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl<Req, Resp> Predictor<Req, Resp> for FakePredictor<Req, Resp>
where
    Req: Clone + Send + Sync,
    Resp: Send,
{
    async fn predict(&self, _ctx: &Context, req: &Req) -> Result<Resp> {
        lock(&self.requests).push(req.clone());
        let next = lock(&self.responses).pop_front();
        next.unwrap_or_else(|| Err(AgentError::Other("no more scripted predictions".into())))
    }
}
