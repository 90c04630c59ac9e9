//! Agent process supervisor.
//!
//! Top-level orchestrator for one external agent process: builds the
//! launch command, spawns and monitors the child, drives the readiness
//! probe, and routes RPC calls through the circuit breaker and retry
//! layers. Owns at most one process handle at a time; collaborators are
//! injected at construction.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agentbridge_core::{
    AgentError, AgentLifecycleEvent, AgentProcessConfig, AgentRequest, AgentResponse, AgentResult,
    AgentSettings, AgentStatusReport, CircuitBreaker, CircuitBreakerConfig, DependencyChecker,
    RetryPolicy, SettingsSource, SupervisorState, TelemetrySink, execute_with_retry,
};

use crate::command::LaunchCommand;
use crate::locate::locate_agent_executable;
use crate::readiness::wait_until_ready_with_interval;
use crate::rpc::RpcClient;
use crate::shutdown::shutdown_child;
use crate::stream::{OutputBuffer, StreamKind, spawn_output_reader};

/// Broadcast channel capacity for lifecycle events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tuning knobs for the supervisor. Defaults suit a real agent install;
/// tests shrink every window.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Circuit breaker configuration for the RPC path
    pub breaker: CircuitBreakerConfig,
    /// Retry attempts per RPC call
    pub retry_attempts: u32,
    /// Fixed backoff between RPC retry attempts
    pub retry_backoff: Duration,
    /// Pause between stop and start during a restart
    pub restart_pause: Duration,
    /// Interval between readiness probes
    pub poll_interval: Duration,
    /// Per-request RPC timeout override
    pub request_timeout: Option<Duration>,
    /// Startup timeout override
    pub startup_timeout: Option<Duration>,
    /// Cooperative-shutdown grace window override
    pub shutdown_grace: Option<Duration>,
    /// Explicit agent executable path, bypassing PATH lookup
    pub agent_binary_path: Option<PathBuf>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            restart_pause: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            request_timeout: None,
            startup_timeout: None,
            shutdown_grace: None,
            agent_binary_path: None,
        }
    }
}

/// Everything owned for one running agent process. Created on start,
/// destroyed on stop; never shared or cloned.
struct AgentHandle {
    child: Child,
    pid: u32,
    client: reqwest::Client,
    base_url: String,
    config: AgentProcessConfig,
    output: OutputBuffer,
    /// True once the child has passed a readiness probe. A cancelled start
    /// leaves a live but unacknowledged child here; the RPC surface stays
    /// closed until a later start probes it successfully.
    ready: bool,
}

/// Supervisor for the external agent process.
pub struct ProcessSupervisor {
    deps: Arc<dyn DependencyChecker>,
    settings: Arc<dyn SettingsSource>,
    telemetry: Arc<dyn TelemetrySink>,
    /// Single-flight gate for lifecycle operations and owner of the handle
    handle: Mutex<Option<AgentHandle>>,
    state: StdMutex<SupervisorState>,
    breaker: StdMutex<CircuitBreaker>,
    retry_policy: RetryPolicy,
    events: broadcast::Sender<AgentLifecycleEvent>,
    options: SupervisorOptions,
}

impl ProcessSupervisor {
    pub fn new(
        deps: Arc<dyn DependencyChecker>,
        settings: Arc<dyn SettingsSource>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self::with_options(deps, settings, telemetry, SupervisorOptions::default())
    }

    pub fn with_options(
        deps: Arc<dyn DependencyChecker>,
        settings: Arc<dyn SettingsSource>,
        telemetry: Arc<dyn TelemetrySink>,
        options: SupervisorOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            deps,
            settings,
            telemetry,
            handle: Mutex::new(None),
            state: StdMutex::new(SupervisorState::Stopped),
            breaker: StdMutex::new(CircuitBreaker::new(options.breaker)),
            retry_policy: RetryPolicy::fixed(options.retry_attempts, options.retry_backoff),
            events,
            options,
        }
    }

    /// Subscribe to lifecycle events. Subscriptions die with the supervisor,
    /// so no listener outlives the instance it observed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentLifecycleEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        self.state.lock().map_or(SupervisorState::Stopped, |s| *s)
    }

    /// True iff a handle exists and its process has not exited.
    pub async fn is_running(&self) -> bool {
        let mut guard = self.handle.lock().await;
        self.handle_is_live(&mut guard)
    }

    /// PID of the running agent process, if any. Mainly for diagnostics.
    pub async fn pid(&self) -> Option<u32> {
        let mut guard = self.handle.lock().await;
        self.handle_is_live(&mut guard).then(|| guard.as_ref().map(|h| h.pid)).flatten()
    }

    /// Recent agent output lines, oldest first.
    pub async fn output_snapshot(&self) -> Vec<crate::stream::OutputLine> {
        let guard = self.handle.lock().await;
        guard.as_ref().map(|h| h.output.snapshot()).unwrap_or_default()
    }

    /// Start the agent process.
    ///
    /// Idempotent: returns `Ok(true)` without side effects when already
    /// running. Expected failures (dependency missing, executable not
    /// found, startup timeout) return `Ok(false)` after emitting a
    /// descriptive event; security-validation failures are fatal to the
    /// attempt and surface as `Err`.
    pub async fn start(&self, cancel: &CancellationToken) -> AgentResult<bool> {
        // Single-flight: concurrent callers serialize here, the loser of
        // the race observes the winner's running process.
        let mut guard = self.handle.lock().await;
        if self.handle_is_live(&mut guard) {
            if guard.as_ref().is_some_and(|h| h.ready) {
                debug!("Agent already running, start is a no-op");
                return Ok(true);
            }
            // A cancelled start left a live child that never passed its
            // readiness probe; probe it now instead of trusting it.
            self.emit(AgentLifecycleEvent::Starting);
            return self.await_readiness(&mut guard, cancel).await;
        }

        let started = Instant::now();
        self.emit(AgentLifecycleEvent::Starting);

        // (a) external CLI dependency
        let report = self.deps.check().await;
        if !report.tool_installed {
            let missing = if report.missing.is_empty() {
                "wrapped CLI tool".to_string()
            } else {
                report.missing.join(", ")
            };
            warn!(%missing, "Start aborted: dependency missing");
            return Ok(self.fail_start(AgentLifecycleEvent::StartError {
                reason: format!("dependency missing: {missing}"),
            }));
        }

        // (b)+(c) configuration and validated launch command
        let config = self.build_config(self.settings.current().await);
        let executable = match locate_agent_executable(&config) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Start aborted: agent executable not found");
                return Ok(self.fail_start(AgentLifecycleEvent::StartError {
                    reason: e.to_string(),
                }));
            }
        };
        // Security validation failures propagate: they must never be
        // downgraded into a best-effort launch.
        let command = LaunchCommand::build(&config, &executable)?;
        info!(command = %command.redacted(), "Launching agent process");

        // (d) spawn with piped stdio and merged environment
        let mut child = match command.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Agent process failed to spawn");
                return Ok(self.fail_start(AgentLifecycleEvent::StartError {
                    reason: format!("spawn failed: {e}"),
                }));
            }
        };
        let Some(pid) = child.id() else {
            let _ = child.kill().await;
            return Ok(self.fail_start(AgentLifecycleEvent::StartError {
                reason: "child exited before a PID was observed".to_string(),
            }));
        };

        // (e) drain both pipes; an undrained pipe can block the child
        let output = OutputBuffer::new();
        if let Some(stdout) = child.stdout.take() {
            spawn_output_reader(stdout, StreamKind::Stdout, output.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_output_reader(stderr, StreamKind::Stderr, output.clone());
        }

        // (f) store the unacknowledged handle, then gate on readiness; a
        // running verdict is only ever issued after a successful probe
        let client = reqwest::Client::new();
        let base_url = config.base_url();
        *guard = Some(AgentHandle {
            child,
            pid,
            client,
            base_url,
            config,
            output,
            ready: false,
        });
        let outcome = self.await_readiness(&mut guard, cancel).await;
        if matches!(outcome, Ok(true)) {
            self.telemetry.record_duration("agent_start", started.elapsed());
        }
        outcome
    }

    /// Run the readiness probe against the held, not-yet-acknowledged
    /// child. On success the handle is marked ready and a `Running` event
    /// is emitted; on timeout the child is stopped; on cancellation the
    /// handle is kept for a follow-up `start()` or `stop()`.
    async fn await_readiness(
        &self,
        guard: &mut Option<AgentHandle>,
        cancel: &CancellationToken,
    ) -> AgentResult<bool> {
        let Some(handle) = guard.as_mut() else {
            return Ok(false);
        };
        let startup_timeout = handle.config.startup_timeout;
        let ready = wait_until_ready_with_interval(
            &handle.client,
            &handle.base_url,
            startup_timeout,
            self.options.poll_interval,
            cancel,
        )
        .await;

        if ready {
            handle.ready = true;
            let port = handle.config.port;
            let pid = handle.pid;
            self.emit(AgentLifecycleEvent::Running { port });
            info!(pid, port, "Agent process is running");
            return Ok(true);
        }
        if cancel.is_cancelled() {
            // Caller abandoned the start: keep the handle so a follow-up
            // start() can re-probe or stop() can terminate the child.
            self.emit(AgentLifecycleEvent::StartError {
                reason: "start cancelled".to_string(),
            });
            return Err(AgentError::Cancelled);
        }
        warn!(timeout = ?startup_timeout, "Agent did not become ready in time");
        if let Some(handle) = guard.take() {
            if let Err(e) = shutdown_child(handle.child, handle.config.shutdown_grace).await {
                warn!(error = %e, "Failed to stop unready agent process");
            }
        }
        Ok(self.fail_start(AgentLifecycleEvent::StartTimeout))
    }

    /// Stop the agent process: cooperative shutdown with a bounded grace
    /// window, then force-termination. Safe to call when not running.
    pub async fn stop(&self) -> AgentResult<()> {
        let mut guard = self.handle.lock().await;
        let Some(handle) = guard.take() else {
            debug!("Stop requested with no running agent, no-op");
            return Ok(());
        };

        self.emit(AgentLifecycleEvent::Stopping);
        let grace = handle.config.shutdown_grace;
        info!(pid = handle.pid, "Stopping agent process");

        // HTTP client and output buffer drop with the handle
        if let Err(e) = shutdown_child(handle.child, grace).await {
            warn!(error = %e, "Error while stopping agent process");
        }

        self.emit(AgentLifecycleEvent::Stopped);
        self.telemetry.record_event("agent_lifecycle", "stopped");
        Ok(())
    }

    /// Stop, brief pause, start. Returns the start outcome.
    pub async fn restart(&self, cancel: &CancellationToken) -> AgentResult<bool> {
        self.stop().await?;
        tokio::select! {
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
            () = tokio::time::sleep(self.options.restart_pause) => {}
        }
        self.start(cancel).await
    }

    /// Send a message to the agent through the breaker + retry stack.
    ///
    /// The breaker observes one outcome per caller-visible result: it wraps
    /// the whole retry sequence, so transient retried failures cannot trip
    /// it prematurely. Caller cancellation is not a breaker failure.
    pub async fn send_message(
        &self,
        request: &AgentRequest,
        cancel: &CancellationToken,
    ) -> AgentResult<AgentResponse> {
        let rpc = self.rpc_client().await.ok_or(AgentError::NotRunning)?;

        {
            let mut breaker = self.breaker.lock().map_err(poisoned_lock)?;
            if !breaker.can_execute() {
                let retry_after = breaker.retry_after();
                debug!(?retry_after, "Circuit open, rejecting call without a network attempt");
                return Err(AgentError::CircuitOpen { retry_after });
            }
        }

        let started = Instant::now();
        let result =
            execute_with_retry(&self.retry_policy, cancel, || rpc.post_message(request, cancel))
                .await;

        {
            let mut breaker = self.breaker.lock().map_err(poisoned_lock)?;
            match &result {
                Ok(_) => breaker.record_success(),
                Err(e) if e.counts_against_breaker() => breaker.record_failure(),
                // No verdict (e.g. cancellation): release a half-open trial
                Err(_) => breaker.abort_trial(),
            }
        }

        match &result {
            Ok(_) => self.telemetry.record_duration("agent_rpc", started.elapsed()),
            Err(e) => self.telemetry.record_event("agent_rpc_error", &e.to_string()),
        }
        result
    }

    /// Current agent status.
    ///
    /// With no running process this is a local "stopped" report and no
    /// network call happens; a failing or cancelled status call maps to an
    /// "error" report rather than an `Err`.
    pub async fn status(&self, cancel: &CancellationToken) -> AgentStatusReport {
        let Some(rpc) = self.rpc_client().await else {
            return AgentStatusReport::stopped();
        };
        match rpc.get_status(cancel).await {
            Ok(report) => report,
            Err(e) => {
                debug!(error = %e, "Status endpoint failed");
                AgentStatusReport::error(e.to_string())
            }
        }
    }

    /// Force the circuit breaker closed. Administrative override.
    pub fn reset_breaker(&self) {
        if let Ok(mut breaker) = self.breaker.lock() {
            breaker.reset();
        }
    }

    /// Explicit disposal: stop the process and release every resource.
    /// Equivalent to `stop()`, named for callers tearing the instance down.
    pub async fn close(&self) -> AgentResult<()> {
        self.stop().await
    }

    fn build_config(&self, settings: AgentSettings) -> AgentProcessConfig {
        let mut config =
            AgentProcessConfig::new(settings.model, settings.provider, settings.api_key);
        if let Some(host) = settings.custom_host {
            config = config.with_host(host);
        }
        if let Some(port) = settings.custom_port {
            config = config.with_port(port);
        }
        for (name, value) in settings.extra_env {
            config = config.with_env(name, value);
        }
        if let Some(timeout) = self.options.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        if let Some(timeout) = self.options.startup_timeout {
            config = config.with_startup_timeout(timeout);
        }
        if let Some(grace) = self.options.shutdown_grace {
            config = config.with_shutdown_grace(grace);
        }
        if let Some(path) = &self.options.agent_binary_path {
            config = config.with_agent_binary_path(path.clone());
        }
        config
    }

    async fn rpc_client(&self) -> Option<RpcClient> {
        let mut guard = self.handle.lock().await;
        if !self.handle_is_live(&mut guard) {
            return None;
        }
        // An unacknowledged child never got a running verdict; its RPC
        // surface stays closed until a start() probes it successfully
        guard.as_ref().filter(|h| h.ready).map(|h| {
            RpcClient::new(h.client.clone(), h.base_url.clone(), h.config.request_timeout)
        })
    }

    /// Liveness check that also reaps a handle whose process has exited,
    /// surfacing the unexpected exit as a `Crashed` event.
    fn handle_is_live(&self, guard: &mut Option<AgentHandle>) -> bool {
        match guard.as_mut() {
            None => false,
            Some(handle) => match handle.child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    warn!(pid = handle.pid, ?status, "Agent process exited unexpectedly");
                    *guard = None;
                    self.emit(AgentLifecycleEvent::Crashed {
                        detail: format!("process exited: {status}"),
                    });
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Failed to query agent process, treating as dead");
                    *guard = None;
                    self.emit(AgentLifecycleEvent::Crashed {
                        detail: format!("liveness query failed: {e}"),
                    });
                    false
                }
            },
        }
    }

    /// Record a failed start: emit the descriptive event, count it, and
    /// transition `Failed` back to `Stopped` after cleanup.
    fn fail_start(&self, event: AgentLifecycleEvent) -> bool {
        self.emit(event);
        self.emit(AgentLifecycleEvent::Stopped);
        false
    }

    fn emit(&self, event: AgentLifecycleEvent) {
        if let Ok(mut state) = self.state.lock() {
            *state = event.state();
        }
        self.telemetry.record_event("agent_lifecycle", event_tag(&event));
        // Only an error when there are no subscribers, which is fine
        let _ = self.events.send(event);
    }
}

// Drop is not async; cooperative shutdown happens in stop()/close().
// This is a last-resort kill so an abandoned supervisor never leaks its
// child process.
impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handle.try_lock()
            && let Some(mut handle) = guard.take()
        {
            let _ = handle.child.start_kill();
        }
    }
}

fn event_tag(event: &AgentLifecycleEvent) -> &'static str {
    match event {
        AgentLifecycleEvent::Starting => "starting",
        AgentLifecycleEvent::Running { .. } => "running",
        AgentLifecycleEvent::StartTimeout => "start_timeout",
        AgentLifecycleEvent::StartError { .. } => "start_error",
        AgentLifecycleEvent::Stopping => "stopping",
        AgentLifecycleEvent::Stopped => "stopped",
        AgentLifecycleEvent::Crashed { .. } => "crashed",
    }
}

fn poisoned_lock<T>(_: std::sync::PoisonError<T>) -> AgentError {
    AgentError::Transport("circuit breaker lock poisoned".to_string())
}
