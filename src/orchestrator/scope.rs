//! Deadline and cancellation shared by every step of one top-level call

use crate::error::{Result, SindError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline plus cancellation token
///
/// Children share the deadline and are cancelled along with their parent,
/// never the other way around.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Scope without a deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Scope cancelled with this one, cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Error the scope ended with, if it already did
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(SindError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SindError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolve once the scope is cancelled or its deadline passed
    pub async fn done(&self) -> SindError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => SindError::Cancelled,
                    _ = sleep_until(deadline) => SindError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                SindError::Cancelled
            }
        }
    }

    /// Run a future, abandoning it when the scope ends first
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }
}
