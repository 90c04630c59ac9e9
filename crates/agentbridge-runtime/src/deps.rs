//! Default dependency checker for the wrapped CLI tool.
//!
//! Runs `<tool> --version` with a bounded wait and reports what is
//! installed. Hosts with their own dependency pipeline can supply a
//! different [`DependencyChecker`] implementation instead.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use agentbridge_core::{DependencyChecker, DependencyReport};

/// How long a `--version` probe may take before the tool is considered absent
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks that the wrapped CLI tool is installed by probing its version.
pub struct CliDependencyChecker {
    tool: String,
}

impl CliDependencyChecker {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl DependencyChecker for CliDependencyChecker {
    async fn check(&self) -> DependencyReport {
        let probe = Command::new(&self.tool)
            .arg("--version")
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let version = stdout
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty());
                debug!(tool = %self.tool, version = ?version, "Dependency probe succeeded");
                match version {
                    Some(v) => DependencyReport::satisfied(v),
                    None => DependencyReport {
                        tool_installed: true,
                        version: None,
                        missing: Vec::new(),
                    },
                }
            }
            Ok(Ok(output)) => {
                debug!(tool = %self.tool, status = ?output.status, "Dependency probe exited nonzero");
                DependencyReport::missing(vec![self.tool.clone()])
            }
            Ok(Err(e)) => {
                debug!(tool = %self.tool, error = %e, "Dependency probe failed to launch");
                DependencyReport::missing(vec![self.tool.clone()])
            }
            Err(_) => {
                debug!(tool = %self.tool, "Dependency probe timed out");
                DependencyReport::missing(vec![self.tool.clone()])
            }
        }
    }
}
