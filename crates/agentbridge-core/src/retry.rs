//! Policy-driven retry for async operations.
//!
//! A [`RetryPolicy`] is supplied per call site: how many attempts, what
//! backoff between them, and which errors are worth retrying. Non-retryable
//! errors propagate immediately; after exhausting attempts the last error
//! propagates unchanged.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AgentError, AgentResult};

type BackoffFn = Box<dyn Fn(u32) -> Duration + Send + Sync>;
type RetryableFn = Box<dyn Fn(&AgentError) -> bool + Send + Sync>;

/// Declarative description of how a failed operation is re-attempted.
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffFn,
    retryable: RetryableFn,
}

impl RetryPolicy {
    /// Policy with a caller-supplied backoff function (attempt -> delay).
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Box::new(backoff),
            retryable: Box::new(AgentError::is_retryable),
        }
    }

    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, move |_| delay)
    }

    /// Exponential backoff: `base * 2^(attempt - 1)`.
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, move |attempt| {
            base.saturating_mul(1u32 << (attempt - 1).min(16))
        })
    }

    /// Replace the retryable-error predicate.
    #[must_use]
    pub fn retry_if(mut self, predicate: impl Fn(&AgentError) -> bool + Send + Sync + 'static) -> Self {
        self.retryable = Box::new(predicate);
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    fn is_retryable(&self, err: &AgentError) -> bool {
        (self.retryable)(err)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Run `operation` under `policy`, honoring cancellation at every wait point.
///
/// Cancellation during a backoff wait surfaces as [`AgentError::Cancelled`];
/// an in-flight attempt is never interrupted from here (the operation itself
/// is expected to observe the token).
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> AgentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !policy.is_retryable(&err) => return Err(err),
            Err(err) if attempt >= policy.max_attempts() => {
                debug!(attempt, error = %err, "Retry attempts exhausted");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after backoff");
                tokio::select! {
                    () = cancel.cancelled() => return Err(AgentError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
