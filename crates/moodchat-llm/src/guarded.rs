use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use moodchat_core::backend::ChatBackend;
use moodchat_core::errors::BackendError;
use moodchat_core::messages::ChatTurn;

/// Timeout and circuit breaker settings for [`GuardedBackend`].
#[derive(Clone, Debug)]
pub struct GuardConfig {
    pub timeout: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

/// Wraps a backend with a per-call timeout and a circuit breaker.
///
/// - Each call is bounded by `timeout`; expiry yields `BackendError::Timeout`
/// - N consecutive failures open the circuit; calls then fail fast with
///   `BackendError::CircuitOpen` until `cooldown` elapses
/// - After cooldown one probe goes through (half-open); success closes the circuit
///
/// Nothing is retried: a failed call surfaces immediately so the caller can
/// fall back.
pub struct GuardedBackend<B: ChatBackend> {
    inner: B,
    config: GuardConfig,
    circuit_state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    total_timeouts: AtomicU64,
}

impl<B: ChatBackend> GuardedBackend<B> {
    pub fn new(inner: B, config: GuardConfig) -> Self {
        Self {
            inner,
            config,
            circuit_state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: B) -> Self {
        Self::new(inner, GuardConfig::default())
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn check_circuit(&self) -> Result<(), BackendError> {
        let state = self.circuit_state.read();
        match &*state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { since } => {
                if since.elapsed() >= self.config.cooldown {
                    drop(state);
                    *self.circuit_state.write() = CircuitState::HalfOpen;
                    info!("circuit breaker half-open, probing backend");
                    Ok(())
                } else {
                    Err(BackendError::CircuitOpen)
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.circuit_state.write();
        if *state != CircuitState::Closed {
            info!("circuit breaker closed after successful request");
            *state = CircuitState::Closed;
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.circuit_state.write();
        let trip = match *state {
            // A failed probe reopens immediately.
            CircuitState::HalfOpen => true,
            CircuitState::Closed => failures >= self.config.failure_threshold,
            CircuitState::Open { .. } => false,
        };
        if trip {
            warn!(
                failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "circuit breaker opened"
            );
            *state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    pub fn total_timeouts(&self) -> u64 {
        self.total_timeouts.load(Ordering::Relaxed)
    }

    pub fn circuit_state_name(&self) -> &'static str {
        match &*self.circuit_state.read() {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[async_trait]
impl<B: ChatBackend> ChatBackend for GuardedBackend<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, history: &[ChatTurn], message: &str) -> Result<String, BackendError> {
        self.check_circuit()?;

        let result =
            match tokio::time::timeout(self.config.timeout, self.inner.complete(history, message))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                    Err(BackendError::Timeout(self.config.timeout))
                }
            };

        match result {
            Ok(text) => {
                self.record_success();
                Ok(text)
            }
            Err(e) => {
                if e.is_fatal() {
                    warn!(error = %e, kind = e.error_kind(), "backend call failed, not recoverable");
                } else {
                    warn!(error = %e, kind = e.error_kind(), "backend call failed");
                }
                self.record_failure();
                Err(e)
            }
        }
    }
}
