//! Error types for agent process management.
//!
//! This module provides a unified error type for every operation in the
//! supervisor stack, keeping error plumbing out of orchestration modules.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while supervising or talking to the agent process.
#[derive(Debug, Error)]
pub enum AgentError {
    // === Startup ===
    /// The wrapped CLI tool is not installed on this machine
    #[error("Required CLI tool is not installed: {missing}")]
    DependencyMissing { missing: String },

    /// The agent executable could not be located
    #[error("Agent executable not found. Searched: {searched}")]
    ExecutableNotFound { searched: String },

    /// The agent process did not become ready within the startup timeout
    #[error("Agent process did not become ready within {waited:?}")]
    StartupTimeout { waited: Duration },

    /// Spawning the agent process failed
    #[error("Failed to spawn agent process: {0}")]
    Spawn(String),

    // === Validation ===
    /// A user-controlled value failed security validation.
    /// Always fatal to the triggering call; never retried or downgraded.
    #[error("Security validation failed: {0}")]
    SecurityValidation(String),

    // === RPC ===
    /// The supervisor has no running agent process
    #[error("Agent process is not running")]
    NotRunning,

    /// The circuit breaker is open; no network attempt was made
    #[error("Circuit breaker is open, retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    /// The request did not complete within the per-request timeout
    #[error("Request timed out after {elapsed:?}")]
    HttpTimeout { elapsed: Duration },

    /// Transport-level failure (connection refused, reset, non-2xx status)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    /// Indicates a protocol mismatch, not transience.
    #[error("Failed to decode agent response: {0}")]
    Deserialization(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    // === IO ===
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create a `SecurityValidation` error with a message
    pub fn security(message: impl Into<String>) -> Self {
        Self::SecurityValidation(message.into())
    }

    /// Returns true if this error indicates a transient transport condition
    /// where retrying may succeed.
    ///
    /// Deserialization failures are deliberately non-retryable: a malformed
    /// response means the peer speaks a different protocol, and retrying
    /// would return the same garbage.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::HttpTimeout { .. } | Self::Transport(_))
    }

    /// Returns true if this error should count as a circuit breaker failure.
    ///
    /// Transport and protocol errors count; caller-initiated cancellation
    /// does not, since it says nothing about the health of the agent.
    #[must_use]
    pub const fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            Self::HttpTimeout { .. } | Self::Transport(_) | Self::Deserialization(_)
        )
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(AgentError::Transport("connection refused".into()).is_retryable());
        assert!(
            AgentError::HttpTimeout {
                elapsed: Duration::from_secs(30)
            }
            .is_retryable()
        );
    }

    #[test]
    fn protocol_and_security_errors_are_not_retryable() {
        assert!(!AgentError::Deserialization("missing field".into()).is_retryable());
        assert!(!AgentError::security("bad hostname").is_retryable());
        assert!(!AgentError::NotRunning.is_retryable());
        assert!(!AgentError::Cancelled.is_retryable());
    }

    #[test]
    fn cancellation_does_not_count_against_breaker() {
        assert!(!AgentError::Cancelled.counts_against_breaker());
        assert!(AgentError::Deserialization("junk".into()).counts_against_breaker());
        assert!(AgentError::Transport("reset".into()).counts_against_breaker());
    }
}
