//! Launch command construction for the agent process.
//!
//! Every user-controlled value passes security validation before it is
//! placed on the command line, and each value lands as its own argv entry.
//! The child is spawned without a shell, so the argument boundaries the
//! validators saw are exactly the boundaries the OS delivers.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use agentbridge_core::{AgentProcessConfig, AgentResult, DEFAULT_HOST, DEFAULT_PORT};

/// A fully validated agent launch command.
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    /// Index of the argv entry holding the API key, for redacted rendering
    key_index: usize,
}

impl LaunchCommand {
    /// Build the launch command for `config`, running every validator first.
    ///
    /// Shape: `<exe> server [--host H] [--port P] -- <tool> --model M
    /// --api-key provider=key --yes-always`. Host and port flags are
    /// omitted when they equal the agent defaults.
    pub fn build(config: &AgentProcessConfig, executable: &Path) -> AgentResult<Self> {
        config.validated()?;

        let mut args = vec!["server".to_string()];
        if config.host != DEFAULT_HOST {
            args.push("--host".to_string());
            args.push(config.host.clone());
        }
        if config.port != DEFAULT_PORT {
            args.push("--port".to_string());
            args.push(config.port.to_string());
        }

        args.push("--".to_string());
        args.push(config.wrapped_tool.clone());
        args.push("--model".to_string());
        args.push(config.model.clone());
        args.push("--api-key".to_string());
        let key_index = args.len();
        args.push(format!(
            "{}={}",
            config.provider.cli_key_name(),
            config.api_key.expose()
        ));
        args.push("--yes-always".to_string());

        Ok(Self {
            program: executable.to_path_buf(),
            args,
            env: config.extra_env.clone(),
            key_index,
        })
    }

    /// Argv entries, secret included. Exposed for tests and spawning only.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line rendering safe to log: the API key entry is redacted.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for (i, arg) in self.args.iter().enumerate() {
            if i == self.key_index {
                let namespace = arg.split('=').next().unwrap_or("key");
                parts.push(format!("{namespace}=***"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    /// Assemble the `tokio` command: discrete argv entries, merged
    /// environment, piped stdio for the drain tasks.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (name, value) in &self.env {
            cmd.env(name, value);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbridge_core::{AgentError, ApiKey, ApiProvider};

    fn config() -> AgentProcessConfig {
        AgentProcessConfig::new(
            "claude-3-5-sonnet",
            ApiProvider::Claude,
            ApiKey::new("sk-ant-test0123456789"),
        )
    }

    #[test]
    fn default_endpoint_omits_host_and_port_flags() {
        let cmd = LaunchCommand::build(&config(), Path::new("/usr/local/bin/agentapi")).unwrap();
        let args = cmd.args();
        assert_eq!(args[0], "server");
        assert!(!args.contains(&"--host".to_string()));
        assert!(!args.contains(&"--port".to_string()));
    }

    #[test]
    fn custom_endpoint_adds_flags_as_discrete_entries() {
        let cfg = config().with_host("127.0.0.1").with_port(4100);
        let cmd = LaunchCommand::build(&cfg, Path::new("/usr/local/bin/agentapi")).unwrap();
        let args = cmd.args();
        let host_pos = args.iter().position(|a| a == "--host").unwrap();
        assert_eq!(args[host_pos + 1], "127.0.0.1");
        let port_pos = args.iter().position(|a| a == "--port").unwrap();
        assert_eq!(args[port_pos + 1], "4100");
    }

    #[test]
    fn wrapped_tool_section_follows_the_separator() {
        let cmd = LaunchCommand::build(&config(), Path::new("agentapi")).unwrap();
        let args = cmd.args();
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "aider");
        assert_eq!(args[sep + 2], "--model");
        assert_eq!(args[sep + 3], "claude-3-5-sonnet");
        assert_eq!(args.last().unwrap(), "--yes-always");
    }

    #[test]
    fn api_key_is_a_single_provider_tagged_entry() {
        let cmd = LaunchCommand::build(&config(), Path::new("agentapi")).unwrap();
        let args = cmd.args();
        let key_pos = args.iter().position(|a| a == "--api-key").unwrap();
        assert_eq!(args[key_pos + 1], "anthropic=sk-ant-test0123456789");
    }

    #[test]
    fn redacted_rendering_never_contains_the_key() {
        let cmd = LaunchCommand::build(&config(), Path::new("agentapi")).unwrap();
        let redacted = cmd.redacted();
        assert!(!redacted.contains("sk-ant-test0123456789"));
        assert!(redacted.contains("anthropic=***"));
        assert!(redacted.contains("--yes-always"));
    }

    #[test]
    fn hostile_model_name_fails_before_any_command_exists() {
        let mut cfg = config();
        cfg.model = "model; rm -rf /".to_string();
        let result = LaunchCommand::build(&cfg, Path::new("agentapi"));
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));
    }

    #[test]
    fn cross_provider_key_fails_before_any_command_exists() {
        // ChatGPT provider with a Claude-formatted key must never reach argv
        let mut cfg = config();
        cfg.provider = ApiProvider::ChatGpt;
        let result = LaunchCommand::build(&cfg, Path::new("agentapi"));
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));
    }

    #[test]
    fn hostile_env_value_is_rejected() {
        let cfg = config().with_env("AIDER_OPTS", "a;b");
        let result = LaunchCommand::build(&cfg, Path::new("agentapi"));
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));
    }
}
