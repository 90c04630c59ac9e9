//! Fail-closed validation for values destined for the agent command line.
//!
//! Every value the host application controls (hostnames, ports, model
//! names, API keys, environment variables) passes through here before it
//! is placed on a subprocess command line. The validators reject rather
//! than repair: a value that fails is surfaced as a
//! [`AgentError::SecurityValidation`] and the operation aborts.
//!
//! Validated values are always passed to the child as discrete argv
//! entries. The child is spawned without a shell, so argument boundaries
//! survive exactly as validated; the metacharacter checks here are a
//! second line behind that.

use crate::config::{ApiProvider, DEFAULT_PORT};
use crate::error::AgentError;

/// Maximum hostname length per RFC 1035
const MAX_HOSTNAME_LEN: usize = 253;
/// Maximum accepted model name length
const MAX_MODEL_LEN: usize = 128;
/// Accepted API key length bounds
const API_KEY_LEN: std::ops::RangeInclusive<usize> = 16..=256;

/// Characters that must never appear in a value bound for a command line
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '>', '<', '(', ')', '{', '}', '[', ']', '"', '\'', '\\', '*', '?',
    '~', '#', '!', '\n', '\r', '\0',
];

/// Validate a hostname for the agent server.
///
/// Accepts `localhost`, loopback literals, or a name composed solely of
/// alphanumerics, dots and hyphens, at most 253 characters.
pub fn validate_hostname(host: &str) -> Result<(), AgentError> {
    if host == "localhost" || host == "127.0.0.1" || host == "::1" {
        return Ok(());
    }
    if host.is_empty() {
        return Err(AgentError::security("Hostname must not be empty"));
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(AgentError::security(format!(
            "Hostname exceeds {MAX_HOSTNAME_LEN} characters"
        )));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(AgentError::security(format!(
            "Hostname contains invalid characters: {host}"
        )));
    }
    if host.starts_with('-') || host.ends_with('-') || host.starts_with('.') || host.ends_with('.')
    {
        return Err(AgentError::security(format!(
            "Hostname has a leading or trailing separator: {host}"
        )));
    }
    Ok(())
}

/// Validate a port for the agent server.
///
/// The agent's default port is always accepted; any other port must be
/// non-privileged (>= 1024).
pub fn validate_port(port: u16) -> Result<(), AgentError> {
    if port == DEFAULT_PORT {
        return Ok(());
    }
    if port < 1024 {
        return Err(AgentError::security(format!(
            "Port {port} is a privileged port; use a port >= 1024"
        )));
    }
    Ok(())
}

/// Validate a model name against a conservative allow-list.
///
/// Model identifiers are alphanumerics plus dot, hyphen, underscore,
/// colon (provider prefixes) and slash (org/model paths).
pub fn validate_model_name(model: &str) -> Result<(), AgentError> {
    if model.is_empty() {
        return Err(AgentError::security("Model name must not be empty"));
    }
    if model.len() > MAX_MODEL_LEN {
        return Err(AgentError::security(format!(
            "Model name exceeds {MAX_MODEL_LEN} characters"
        )));
    }
    if !model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/'))
    {
        return Err(AgentError::security(format!(
            "Model name contains invalid characters: {model}"
        )));
    }
    Ok(())
}

/// Validate a provider/API-key pair as a unit.
///
/// The key format must be consistent with its provider, which rejects
/// cross-provider key confusion (e.g. a Claude key supplied for ChatGPT),
/// not just malformed keys.
pub fn validate_api_key(provider: ApiProvider, key: &str) -> Result<(), AgentError> {
    if !API_KEY_LEN.contains(&key.len()) {
        return Err(AgentError::security(format!(
            "API key length is out of bounds for {provider}"
        )));
    }
    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(AgentError::security(
            "API key contains whitespace or non-printable characters",
        ));
    }

    let format_ok = match provider {
        ApiProvider::Claude => key.starts_with("sk-ant-"),
        ApiProvider::ChatGpt => key.starts_with("sk-") && !key.starts_with("sk-ant-"),
        ApiProvider::Gemini => key.starts_with("AIza"),
    };
    if !format_ok {
        return Err(AgentError::security(format!(
            "API key format does not match provider {provider}"
        )));
    }
    Ok(())
}

/// Validate an environment variable name.
pub fn validate_env_name(name: &str) -> Result<(), AgentError> {
    if name.is_empty() {
        return Err(AgentError::security(
            "Environment variable name must not be empty",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AgentError::security(format!(
            "Environment variable name contains invalid characters: {name}"
        )));
    }
    Ok(())
}

/// Reject a value containing shell metacharacters or control characters.
///
/// Rejecting instead of stripping keeps the contract honest: a value that
/// fails validation never reaches the command line in any form.
pub fn sanitize_argument(value: &str) -> Result<(), AgentError> {
    if value.chars().any(|c| c.is_control()) {
        return Err(AgentError::security(
            "Argument contains control characters",
        ));
    }
    if let Some(bad) = value.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(AgentError::security(format!(
            "Argument contains shell metacharacter {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hostnames_are_accepted() {
        for host in ["localhost", "127.0.0.1", "::1"] {
            assert!(validate_hostname(host).is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn plain_dns_hostnames_are_accepted() {
        for host in ["agent.internal", "build-host-12", "a.b-c.example"] {
            assert!(validate_hostname(host).is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn hostile_hostnames_are_rejected() {
        let hostile = [
            "",
            "host;rm -rf /",
            "host name",
            "host|cat",
            "$(whoami).example",
            "host`id`",
            "-leading.example",
            "trailing-",
            ".dotted",
        ];
        for host in hostile {
            assert!(
                matches!(
                    validate_hostname(host),
                    Err(AgentError::SecurityValidation(_))
                ),
                "{host:?} should be rejected"
            );
        }
    }

    #[test]
    fn overlong_hostname_is_rejected() {
        let long = "a".repeat(254);
        assert!(validate_hostname(&long).is_err());
        let at_limit = "a".repeat(253);
        assert!(validate_hostname(&at_limit).is_ok());
    }

    #[test]
    fn privileged_ports_are_rejected() {
        for port in [1, 22, 80, 443, 1023] {
            assert!(
                matches!(validate_port(port), Err(AgentError::SecurityValidation(_))),
                "port {port} should be rejected"
            );
        }
    }

    #[test]
    fn default_and_user_ports_are_accepted() {
        for port in [DEFAULT_PORT, 1024, 8080, 65535] {
            assert!(validate_port(port).is_ok(), "port {port} should be accepted");
        }
    }

    #[test]
    fn model_names_follow_allow_list() {
        assert!(validate_model_name("claude-3-5-sonnet-20241022").is_ok());
        assert!(validate_model_name("openrouter/anthropic/claude-3.5").is_ok());
        assert!(validate_model_name("gpt-4o:latest").is_ok());

        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("model; rm -rf /").is_err());
        assert!(validate_model_name("model name").is_err());
        assert!(validate_model_name(&"m".repeat(129)).is_err());
    }

    #[test]
    fn provider_key_pairs_validate_as_a_unit() {
        assert!(validate_api_key(ApiProvider::Claude, "sk-ant-abc123def456ghi").is_ok());
        assert!(validate_api_key(ApiProvider::ChatGpt, "sk-proj-abc123def456").is_ok());
        assert!(validate_api_key(ApiProvider::Gemini, "AIzaSyA0123456789abcdef").is_ok());
    }

    #[test]
    fn cross_provider_keys_are_rejected() {
        // A Claude-formatted key paired with the ChatGPT provider must fail
        let result = validate_api_key(ApiProvider::ChatGpt, "sk-ant-abc123def456ghi");
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));

        let result = validate_api_key(ApiProvider::Claude, "sk-proj-abc123def456");
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));

        let result = validate_api_key(ApiProvider::Gemini, "sk-ant-abc123def456ghi");
        assert!(matches!(result, Err(AgentError::SecurityValidation(_))));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(validate_api_key(ApiProvider::Claude, "short").is_err());
        assert!(validate_api_key(ApiProvider::Claude, "sk-ant-has space123").is_err());
        assert!(validate_api_key(ApiProvider::Claude, &"x".repeat(257)).is_err());
    }

    #[test]
    fn env_names_are_restricted() {
        assert!(validate_env_name("AIDER_CACHE_DIR").is_ok());
        assert!(validate_env_name("PATH2").is_ok());
        assert!(validate_env_name("").is_err());
        assert!(validate_env_name("BAD-NAME").is_err());
        assert!(validate_env_name("BAD NAME").is_err());
    }

    #[test]
    fn shell_metacharacters_are_rejected_not_stripped() {
        for value in [
            "a;b", "a&b", "a|b", "a`b", "a$b", "a>b", "a<b", "a(b", "a)b", "a\"b", "a'b", "a\\b",
            "a\nb",
        ] {
            assert!(
                matches!(
                    sanitize_argument(value),
                    Err(AgentError::SecurityValidation(_))
                ),
                "{value:?} should be rejected"
            );
        }
        assert!(sanitize_argument("plain-value_1.2").is_ok());
        assert!(sanitize_argument("two words").is_ok());
    }
}
