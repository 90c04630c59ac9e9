//! HTTP RPC client for the agent process.
//!
//! Thin, strict wrapper over the agent's two endpoints. Each request runs
//! under a request-scoped deadline (the earlier of the caller's
//! cancellation and the configured per-request timeout), and responses are
//! decoded strictly so a malformed payload surfaces as a protocol error
//! rather than a plausible-looking empty result.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use agentbridge_core::{AgentError, AgentRequest, AgentResponse, AgentResult, AgentStatusReport};

/// How much of an error body to carry into a transport error message
const ERROR_BODY_PREVIEW: usize = 200;

/// Client for the agent's HTTP surface, bound to one base URL.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl RpcClient {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String, request_timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            request_timeout,
        }
    }

    /// `POST /message`: send a prompt, receive a completion.
    pub async fn post_message(
        &self,
        request: &AgentRequest,
        cancel: &CancellationToken,
    ) -> AgentResult<AgentResponse> {
        let url = format!("{}/message", self.base_url);
        let send = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.request_timeout)
            .send();

        let response = tokio::select! {
            result = send => result.map_err(|e| self.map_send_error(&e))?,
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
        };

        let body = self.read_success_body(response).await?;
        decode_strict(&body)
    }

    /// `GET /status`: current agent state. The readiness prober hits the
    /// same endpoint during startup with its own, shorter deadline.
    pub async fn get_status(&self, cancel: &CancellationToken) -> AgentResult<AgentStatusReport> {
        let url = format!("{}/status", self.base_url);
        let send = self.client.get(&url).timeout(self.request_timeout).send();

        let response = tokio::select! {
            result = send => result.map_err(|e| self.map_send_error(&e))?,
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
        };

        let body = self.read_success_body(response).await?;
        decode_strict(&body)
    }

    fn map_send_error(&self, err: &reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::HttpTimeout {
                elapsed: self.request_timeout,
            }
        } else {
            AgentError::Transport(err.to_string())
        }
    }

    async fn read_success_body(&self, response: reqwest::Response) -> AgentResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            debug!(%status, "Agent returned error status");
            return Err(AgentError::Transport(format!(
                "agent returned {status}: {preview}"
            )));
        }
        Ok(body)
    }
}

/// Decode a JSON body into `T`, surfacing shape mismatches as
/// [`AgentError::Deserialization`].
fn decode_strict<T: serde::de::DeserializeOwned>(body: &str) -> AgentResult<T> {
    serde_json::from_str(body).map_err(|e| AgentError::Deserialization(e.to_string()))
}
