//! Supervisor lifecycle states and events.
//!
//! Events are emitted by the supervisor and consumed by host-side
//! listeners (status bar, telemetry). Listeners should treat them as the
//! sole source of truth for agent process state.

use serde::{Deserialize, Serialize};

/// Supervisor lifecycle state machine.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`, with `Failed`
/// reachable from `Starting`; after cleanup the supervisor transitions
/// back to `Stopped`. There is no `Stopped -> Running` shortcut, so
/// readiness probing always occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// Start attempt failed; transient, cleaned up back to `Stopped`
    Failed,
}

/// Agent process lifecycle event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentLifecycleEvent {
    /// A start attempt has begun
    Starting,
    /// The process is up and passed its readiness probe
    Running { port: u16 },
    /// The process did not become ready within the startup timeout
    StartTimeout,
    /// The start attempt failed before or during readiness probing
    StartError { reason: String },
    /// A stop has been initiated
    Stopping,
    /// The process has stopped and resources were released
    Stopped,
    /// The process exited on its own while supervised
    Crashed { detail: String },
}

impl AgentLifecycleEvent {
    /// The supervisor state this event corresponds to.
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        match self {
            Self::Starting => SupervisorState::Starting,
            Self::Running { .. } => SupervisorState::Running,
            Self::StartTimeout | Self::StartError { .. } => SupervisorState::Failed,
            Self::Stopping => SupervisorState::Stopping,
            Self::Stopped | Self::Crashed { .. } => SupervisorState::Stopped,
        }
    }
}
