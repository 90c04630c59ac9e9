//! Agent executable location and validation.
//!
//! Resolution precedence: explicit configuration, then `PATH`, then a
//! short list of platform-conventional install directories. A candidate
//! only wins if it exists and is executable; everything probed is listed
//! in the error so the host can show the user where we looked.

use std::path::{Path, PathBuf};

use tracing::debug;

use agentbridge_core::{AgentError, AgentProcessConfig, AgentResult};

/// Resolve the agent server executable for this config.
pub fn locate_agent_executable(config: &AgentProcessConfig) -> AgentResult<PathBuf> {
    let mut searched: Vec<String> = Vec::new();

    // Strategy 1: explicit configuration override
    if let Some(explicit) = &config.agent_binary_path {
        if is_executable(explicit) {
            debug!(path = %explicit.display(), "Using explicitly configured agent executable");
            return Ok(explicit.clone());
        }
        searched.push(explicit.display().to_string());
        return Err(AgentError::ExecutableNotFound {
            searched: searched.join(", "),
        });
    }

    // Strategy 2: PATH lookup
    match which::which(&config.agent_binary) {
        Ok(path) => {
            debug!(path = %path.display(), "Found agent executable on PATH");
            return Ok(path);
        }
        Err(_) => searched.push(format!("PATH ({})", config.agent_binary)),
    }

    // Strategy 3: conventional install directories
    for dir in conventional_install_dirs() {
        let candidate = dir.join(binary_filename(&config.agent_binary));
        if is_executable(&candidate) {
            debug!(path = %candidate.display(), "Found agent executable in conventional directory");
            return Ok(candidate);
        }
        searched.push(candidate.display().to_string());
    }

    Err(AgentError::ExecutableNotFound {
        searched: searched.join(", "),
    })
}

/// Platform-conventional directories where the agent tool installs itself.
fn conventional_install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(&home).join(".local/bin"));
            dirs.push(PathBuf::from(&home).join("bin"));
        }
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
    }

    #[cfg(windows)]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(&local).join("Programs"));
        }
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            dirs.push(PathBuf::from(&profile).join("bin"));
        }
    }

    dirs
}

#[cfg(windows)]
fn binary_filename(name: &str) -> String {
    format!("{name}.exe")
}

#[cfg(not(windows))]
fn binary_filename(name: &str) -> String {
    name.to_string()
}

/// Check that a path exists, is a file, and carries an execute bit (unix).
fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match path.metadata() {
            Ok(metadata) => metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbridge_core::{ApiKey, ApiProvider};

    fn config() -> AgentProcessConfig {
        AgentProcessConfig::new(
            "claude-3-5-sonnet",
            ApiProvider::Claude,
            ApiKey::new("sk-ant-test0123456789"),
        )
    }

    #[test]
    fn missing_explicit_path_lists_it_in_the_error() {
        let config = config().with_agent_binary_path("/nonexistent/agentapi");
        let err = locate_agent_executable(&config).unwrap_err();
        match err {
            AgentError::ExecutableNotFound { searched } => {
                assert!(searched.contains("/nonexistent/agentapi"));
            }
            other => panic!("expected ExecutableNotFound, got {other:?}"),
        }
    }

    #[test]
    fn unknown_binary_reports_everything_probed() {
        let mut config = config();
        config.agent_binary = "definitely-not-a-real-binary-name".to_string();
        let err = locate_agent_executable(&config).unwrap_err();
        match err {
            AgentError::ExecutableNotFound { searched } => {
                assert!(searched.contains("PATH"));
            }
            other => panic!("expected ExecutableNotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn explicit_executable_wins() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agentapi");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();

        let config = config().with_agent_binary_path(&path);
        assert_eq!(locate_agent_executable(&config).unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_explicit_path_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agentapi");
        std::fs::write(&path, "not a binary").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(&path, perms).unwrap();

        let config = config().with_agent_binary_path(&path);
        assert!(locate_agent_executable(&config).is_err());
    }
}
