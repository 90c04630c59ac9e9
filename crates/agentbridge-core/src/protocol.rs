//! Wire types for the agent process HTTP surface.
//!
//! The agent exposes two endpoints: `GET /status` (readiness + current
//! state) and `POST /message` (send a prompt, receive a completion).
//! Responses are decoded strictly: unknown fields and missing fields are
//! errors, never silently defaulted, so a malformed payload surfaces as a
//! protocol error instead of a plausible-looking empty result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /message`.
///
/// Plain serializable record; no identity beyond its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    /// The message content to send to the agent
    pub content: String,
    /// Optional structured context (e.g. file snippets) the host attaches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Optional session identifier for multi-turn conversations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AgentRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            context: None,
            session_id: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Token accounting reported by the agent for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response body from `POST /message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentResponse {
    /// The agent's reply content
    pub content: String,
    /// Token usage for this exchange
    pub usage: TokenUsage,
    /// When the agent finished producing the response
    pub completed_at: DateTime<Utc>,
}

/// Response body from `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentStatusReport {
    /// Current agent state as reported by the agent itself
    /// (e.g. "stable", "running"), or synthesized by the supervisor
    /// ("stopped", "error") when no network call was possible
    pub state: String,
    /// Model the agent is currently serving, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Seconds since the agent process started, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
}

impl AgentStatusReport {
    /// Report for a supervisor with no running process. Produced locally,
    /// without any network call.
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            state: "stopped".to_string(),
            model: None,
            uptime_secs: None,
        }
    }

    /// Report for a running process whose status endpoint failed.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            state: format!("error: {}", detail.into()),
            model: None,
            uptime_secs: None,
        }
    }
}
