//! Run Context
//!
//! Cancellation and deadline propagation for a single agent run. The context is
//! threaded through every predictor, model call and tool call; the suspension
//! points wrap their futures in [`Context::guard`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};

/// Caller-supplied cancellation and deadline token
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context around an existing token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context: cancelled when the parent is, cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the context is already done
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AgentError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run `fut` until it completes, the token is cancelled, or the deadline passes.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AgentError::Cancelled),
            _ = expired => Err(AgentError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
