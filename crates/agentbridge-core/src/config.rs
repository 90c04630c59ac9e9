//! Agent process configuration.
//!
//! `AgentProcessConfig` captures everything needed to launch one agent
//! process run. It is rebuilt from the collaborator-supplied settings on
//! every start and never mutated while the process is alive.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::validate;

/// Default host the agent server binds to
pub const DEFAULT_HOST: &str = "localhost";
/// Default port the agent server listens on
pub const DEFAULT_PORT: u16 = 3284;
/// Default name of the agent server executable
pub const DEFAULT_AGENT_BINARY: &str = "agentapi";
/// Default name of the CLI tool the agent server wraps
pub const DEFAULT_WRAPPED_TOOL: &str = "aider";

/// Known API providers for the wrapped CLI tool.
///
/// The provider is validated together with its API key as a unit, so a key
/// formatted for one provider is rejected when paired with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    Claude,
    ChatGpt,
    Gemini,
}

impl ApiProvider {
    /// Namespace the wrapped tool expects in its `--api-key provider=key` flag.
    #[must_use]
    pub const fn cli_key_name(self) -> &'static str {
        match self {
            Self::Claude => "anthropic",
            Self::ChatGpt => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Claude => "Claude",
            Self::ChatGpt => "ChatGPT",
            Self::Gemini => "Gemini",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ApiProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "chatgpt" | "openai" => Ok(Self::ChatGpt),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(AgentError::security(format!("Unknown provider: {other}"))),
        }
    }
}

/// An API key. Redacted in every `Debug`/`Display` rendering so it can
/// never leak into logs; the raw value is only reachable via `expose()`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Access the raw key. Call sites are limited to argv assembly.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Immutable configuration for one agent process run.
#[derive(Debug, Clone)]
pub struct AgentProcessConfig {
    /// Host the agent server binds to
    pub host: String,
    /// Port the agent server listens on
    pub port: u16,
    /// Model name passed to the wrapped tool
    pub model: String,
    /// API provider for the wrapped tool
    pub provider: ApiProvider,
    /// API key, provider-tagged
    pub api_key: ApiKey,
    /// Per-request timeout for RPC calls
    pub request_timeout: Duration,
    /// How long to wait for the process to become ready
    pub startup_timeout: Duration,
    /// Grace window for cooperative shutdown before force-terminating
    pub shutdown_grace: Duration,
    /// Extra environment variables merged into the child environment,
    /// in insertion order
    pub extra_env: Vec<(String, String)>,
    /// Explicit path to the agent executable, overriding PATH lookup
    pub agent_binary_path: Option<PathBuf>,
    /// Name of the agent server executable
    pub agent_binary: String,
    /// Name of the CLI tool the agent server wraps
    pub wrapped_tool: String,
}

impl AgentProcessConfig {
    /// Create a config with defaults for everything but the model and key.
    pub fn new(model: impl Into<String>, provider: ApiProvider, api_key: ApiKey) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model: model.into(),
            provider,
            api_key,
            request_timeout: Duration::from_secs(30),
            startup_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            extra_env: Vec::new(),
            agent_binary_path: None,
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
            wrapped_tool: DEFAULT_WRAPPED_TOOL.to_string(),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_agent_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.agent_binary_path = Some(path.into());
        self
    }

    /// Base URL of the agent's HTTP surface for this config.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// True when the host/port match the agent's built-in defaults,
    /// in which case the flags are omitted from the launch command.
    #[must_use]
    pub fn is_default_endpoint(&self) -> bool {
        self.host == DEFAULT_HOST && self.port == DEFAULT_PORT
    }

    /// Run every security validator over the user-controlled fields.
    ///
    /// Must pass before any process is spawned. Failures are fatal to the
    /// start attempt and are never downgraded into best-effort values.
    pub fn validated(&self) -> Result<(), AgentError> {
        validate::validate_hostname(&self.host)?;
        validate::validate_port(self.port)?;
        validate::validate_model_name(&self.model)?;
        validate::validate_api_key(self.provider, self.api_key.expose())?;
        for (name, value) in &self.extra_env {
            validate::validate_env_name(name)?;
            validate::sanitize_argument(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claude_config() -> AgentProcessConfig {
        AgentProcessConfig::new(
            "claude-3-5-sonnet",
            ApiProvider::Claude,
            ApiKey::new("sk-ant-test0123456789"),
        )
    }

    #[test]
    fn defaults_match_agent_conventions() {
        let config = claude_config();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3284);
        assert!(config.is_default_endpoint());
        assert_eq!(config.base_url(), "http://localhost:3284");
    }

    #[test]
    fn custom_port_is_not_default_endpoint() {
        let config = claude_config().with_port(4000);
        assert!(!config.is_default_endpoint());
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = claude_config();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-ant-test"));
        assert!(rendered.contains("ApiKey(***)"));
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(claude_config().validated().is_ok());
    }

    #[test]
    fn provider_parsing_accepts_aliases() {
        assert_eq!("anthropic".parse::<ApiProvider>().unwrap(), ApiProvider::Claude);
        assert_eq!("ChatGPT".parse::<ApiProvider>().unwrap(), ApiProvider::ChatGpt);
        assert!("mistral".parse::<ApiProvider>().is_err());
    }

    #[test]
    fn cli_key_names_match_wrapped_tool_namespaces() {
        assert_eq!(ApiProvider::Claude.cli_key_name(), "anthropic");
        assert_eq!(ApiProvider::ChatGpt.cli_key_name(), "openai");
        assert_eq!(ApiProvider::Gemini.cli_key_name(), "gemini");
    }
}
