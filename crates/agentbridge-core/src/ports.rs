//! Collaborator port definitions.
//!
//! The supervisor takes its collaborators (dependency checker, settings
//! source, telemetry sink) as explicit constructor arguments behind these
//! traits. There is no ambient lookup: a host that wants different wiring
//! passes different implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ApiKey, ApiProvider};

/// Result of checking the machine for the wrapped CLI tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    /// Whether the wrapped CLI tool is installed and runnable
    pub tool_installed: bool,
    /// Version string reported by the tool, when available
    pub version: Option<String>,
    /// Human-readable names of anything missing
    pub missing: Vec<String>,
}

impl DependencyReport {
    /// Report for a machine with everything installed.
    #[must_use]
    pub fn satisfied(version: impl Into<String>) -> Self {
        Self {
            tool_installed: true,
            version: Some(version.into()),
            missing: Vec::new(),
        }
    }

    /// Report for a machine missing the named dependencies.
    #[must_use]
    pub fn missing(names: Vec<String>) -> Self {
        Self {
            tool_installed: false,
            version: None,
            missing: names,
        }
    }
}

/// Port for verifying external CLI dependencies before a start attempt.
#[async_trait]
pub trait DependencyChecker: Send + Sync {
    /// Check whether the wrapped CLI tool and its prerequisites are installed.
    async fn check(&self) -> DependencyReport;
}

/// Host-supplied settings the supervisor reads on every start.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model name for the wrapped tool
    pub model: String,
    /// API provider
    pub provider: ApiProvider,
    /// API key for the provider
    pub api_key: ApiKey,
    /// Host override; `None` means the agent default
    pub custom_host: Option<String>,
    /// Port override; `None` means the agent default
    pub custom_port: Option<u16>,
    /// Extra environment variables for the child, in order
    pub extra_env: Vec<(String, String)>,
}

/// Port for the host's current configuration.
///
/// Read at the top of every start attempt so a restart picks up edits the
/// user made since the last run.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn current(&self) -> AgentSettings;
}

/// Port for the host's telemetry/metrics sink.
///
/// Calls are expected to be cheap and non-blocking; the supervisor invokes
/// them inline on lifecycle transitions and RPC outcomes.
pub trait TelemetrySink: Send + Sync {
    /// Record a named event with a short detail string.
    fn record_event(&self, name: &str, detail: &str);

    /// Record how long a named operation took.
    fn record_duration(&self, name: &str, elapsed: Duration);
}

/// Telemetry sink that discards everything. Useful for tests and hosts
/// without a metrics pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_event(&self, _name: &str, _detail: &str) {}
    fn record_duration(&self, _name: &str, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_report_has_no_missing_entries() {
        let report = DependencyReport::satisfied("0.82.1");
        assert!(report.tool_installed);
        assert_eq!(report.version.as_deref(), Some("0.82.1"));
        assert!(report.missing.is_empty());
    }

    #[test]
    fn missing_report_lists_names() {
        let report = DependencyReport::missing(vec!["aider".to_string()]);
        assert!(!report.tool_installed);
        assert_eq!(report.missing, vec!["aider".to_string()]);
    }
}
