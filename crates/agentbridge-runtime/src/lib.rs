//! Process runtime and OS-level concerns for agentbridge.
//!
//! This crate turns the domain types in `agentbridge-core` into a working
//! agent process: executable location, validated launch-command assembly,
//! stdout/stderr draining, graceful shutdown, readiness probing, the HTTP
//! RPC client, and the [`supervisor::ProcessSupervisor`] that ties them
//! together behind the circuit breaker and retry layers.

pub mod command;
pub mod deps;
pub mod locate;
pub mod readiness;
pub mod rpc;
pub mod shutdown;
pub mod stream;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use command::LaunchCommand;
pub use deps::CliDependencyChecker;
pub use locate::locate_agent_executable;
pub use readiness::{wait_until_ready, wait_until_ready_with_interval};
pub use rpc::RpcClient;
pub use shutdown::shutdown_child;
pub use stream::{OutputBuffer, OutputLine, StreamKind, spawn_output_reader};
pub use supervisor::{ProcessSupervisor, SupervisorOptions};

// Silence unused dev-dependency warnings; these are exercised from the
// integration tests in tests/
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tracing_subscriber as _;
