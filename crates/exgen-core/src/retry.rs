//! Retries for collaborator reads.
//!
//! Transient failures are retried with exponential backoff capped at one
//! minute. Permanent failures return immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::{FormulaError, LookupError};

const MAX_DELAY: Duration = Duration::from_secs(60);

/// Errors that can tell a transient failure from a permanent one.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for LookupError {
    fn is_transient(&self) -> bool {
        !self.is_permanent()
    }
}

impl Retryable for FormulaError {
    fn is_transient(&self) -> bool {
        matches!(self, FormulaError::Lookup(e) if !e.is_permanent())
    }
}

/// How many times, and how patiently, a failed read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails permanently or runs out of retries.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!("{what} failed (attempt {attempt}), retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
