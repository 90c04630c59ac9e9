//! Circuit breaker guarding the agent RPC path.
//!
//! The breaker observes one outcome per caller-visible call (after any
//! retries) and stops issuing calls to a failing agent for a cooldown
//! period. It is a plain state machine; the supervisor owns it behind a
//! mutex and drives it around each RPC call.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through
    Closed,
    /// Calls are rejected without a network attempt
    Open,
    /// One trial call is in flight to test recovery
    HalfOpen,
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a trial call
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Failure-aware gate around the agent RPC path.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            config,
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// In `Open`, once the recovery timeout has elapsed since the last
    /// failure this transitions to `HalfOpen` and admits exactly one trial
    /// call; further queries return false until the trial's outcome is
    /// recorded.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            // Trial already dispatched; hold further calls until it resolves
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                if let Some(last_failure) = self.last_failure
                    && last_failure.elapsed() >= self.config.recovery_timeout
                {
                    info!("Circuit breaker entering half-open state");
                    self.state = CircuitState::HalfOpen;
                    return true;
                }
                false
            }
        }
    }

    /// Record a successful caller-visible outcome.
    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            info!("Circuit breaker closing after successful call");
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure = None;
    }

    /// Record a failed caller-visible outcome.
    pub fn record_failure(&mut self) {
        self.last_failure = Some(Instant::now());
        match self.state {
            CircuitState::HalfOpen => {
                // Trial failed; back to open with a fresh cooldown
                warn!("Circuit breaker trial call failed, reopening");
                self.state = CircuitState::Open;
            }
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        failures = self.failure_count,
                        "Circuit breaker opened after consecutive failures"
                    );
                    self.state = CircuitState::Open;
                } else {
                    debug!(failures = self.failure_count, "Circuit breaker failure recorded");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Return the half-open trial slot without recording a verdict.
    ///
    /// Used when the trial call was cancelled by the caller: cancellation
    /// says nothing about the agent's health, so the breaker goes back to
    /// `Open` with the original failure time intact and the next query
    /// admits a fresh trial immediately.
    pub fn abort_trial(&mut self) {
        if self.state == CircuitState::HalfOpen {
            debug!("Circuit breaker trial aborted without a verdict");
            self.state = CircuitState::Open;
        }
    }

    /// Force the breaker back to `Closed` unconditionally.
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure = None;
    }

    /// Time remaining until the next trial call would be admitted.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        match (self.state, self.last_failure) {
            (CircuitState::Open, Some(last)) => self
                .config
                .recovery_timeout
                .saturating_sub(last.elapsed()),
            _ => Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    #[must_use]
    pub const fn failure_count(&self) -> u32 {
        self.failure_count
    }
}
