//! Core domain types and port definitions for agentbridge.
//!
//! This crate is adapter-free: configuration and validation for the agent
//! process, the error taxonomy, the circuit breaker and retry primitives,
//! the wire protocol types, lifecycle events, and the collaborator port
//! traits the runtime crate wires together. Process spawning, HTTP, and
//! OS concerns live in `agentbridge-runtime`.

pub mod breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod ports;
pub mod protocol;
pub mod retry;
pub mod validate;

// Re-export commonly used types for convenience
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{
    AgentProcessConfig, ApiKey, ApiProvider, DEFAULT_AGENT_BINARY, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_WRAPPED_TOOL,
};
pub use error::{AgentError, AgentResult};
pub use events::{AgentLifecycleEvent, SupervisorState};
pub use ports::{
    AgentSettings, DependencyChecker, DependencyReport, NoopTelemetry, SettingsSource,
    TelemetrySink,
};
pub use protocol::{AgentRequest, AgentResponse, AgentStatusReport, TokenUsage};
pub use retry::{RetryPolicy, execute_with_retry};

// Silence unused dev-dependency warnings; mocks for the port traits are
// defined in the runtime crate's tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
