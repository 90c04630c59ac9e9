//! Readiness probing for a freshly spawned agent process.
//!
//! Polls the agent's `/status` endpoint until it answers with a 2xx, the
//! startup timeout elapses, or the caller cancels. Connection refusal and
//! per-probe timeouts are "not ready yet" while the child is still
//! booting, not errors.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Interval between readiness probes
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Per-probe HTTP timeout; bounded so a hung accept never eats the budget
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait until the agent at `base_url` answers its status endpoint.
///
/// Returns true once a 2xx is observed, false on startup timeout or
/// cancellation.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    base_url: &str,
    startup_timeout: Duration,
    cancel: &CancellationToken,
) -> bool {
    wait_until_ready_with_interval(client, base_url, startup_timeout, POLL_INTERVAL, cancel).await
}

/// Variant with a caller-chosen poll interval. The 1-second default is
/// right for real agent startups; tests use something much shorter.
pub async fn wait_until_ready_with_interval(
    client: &reqwest::Client,
    base_url: &str,
    startup_timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> bool {
    let status_url = format!("{base_url}/status");
    info!(url = %status_url, "Waiting for agent process to become ready");

    let probe_loop = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let request = client.get(&status_url).timeout(PROBE_TIMEOUT).send();
            match request.await {
                Ok(response) if response.status().is_success() => {
                    info!(attempt, "Agent process is ready");
                    return true;
                }
                Ok(response) => {
                    debug!(attempt, status = %response.status(), "Agent not ready yet");
                }
                Err(e) => {
                    // Expected while the child is still booting
                    debug!(attempt, error = %e, "Agent not reachable yet");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::select! {
        ready = probe_loop => ready,
        () = tokio::time::sleep(startup_timeout) => {
            debug!(timeout = ?startup_timeout, "Readiness probe timed out");
            false
        }
        () = cancel.cancelled() => {
            debug!("Readiness probe cancelled");
            false
        }
    }
}
