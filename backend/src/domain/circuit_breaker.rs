//! Per-source circuit breaker.
//!
//! States: `Closed` (initial), `Open`, `HalfOpen`. Transitions: `Closed` ->
//! `Open` once `failure_count >= failure_threshold`; `Open` -> `HalfOpen`
//! automatically once `recovery_timeout` has elapsed since the last
//! failure; `HalfOpen` -> `Closed` on the first successful probe;
//! `HalfOpen` -> `Open` on probe failure. At most one probe may be in
//! flight while `HalfOpen`.
//!
//! Generalised from the enrichment worker's `CircuitInternalState` to a
//! standalone, reusable per-source breaker.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;

/// Tunables for a single circuit breaker instance.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to trip from `Closed` to `Open`.
    pub failure_threshold: u32,
    /// How long the breaker stays `Open` before allowing a probe.
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

/// Observable breaker state, exposed for tests and operator status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Calls pass through normally.
    Closed,
    /// Calls fail fast without invoking the wrapped operation.
    Open,
    /// A single probe call is permitted to test recovery.
    HalfOpen,
}

#[derive(Debug, Clone)]
enum Internal {
    Closed { consecutive_failures: u32 },
    Open { opened_at: DateTime<Utc> },
    HalfOpen { probe_in_flight: bool },
}

/// Error surfaced by [`CircuitBreaker::call`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit is open (or a probe is already in flight); `op` was not invoked.
    #[error("circuit open, retry after {retry_after_secs}s")]
    Open {
        /// Hint for how long the caller should wait before retrying.
        retry_after_secs: u64,
    },
    /// The wrapped operation ran and failed; this failure counts toward the breaker.
    #[error(transparent)]
    Rejected(E),
}

/// Per-source failure gate wrapping an arbitrary async operation.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: std::sync::Arc<dyn Clock>,
    state: Mutex<Internal>,
}

impl CircuitBreaker {
    /// Build a new breaker, clamping `failure_threshold` to at least 1.
    #[must_use]
    pub fn new(mut config: CircuitBreakerConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        Self {
            config,
            clock,
            state: Mutex::new(Internal::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Current externally-visible state, advancing `Open` to `HalfOpen`
    /// in place if the recovery timeout has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        #[expect(clippy::unwrap_used, reason = "mutex is never poisoned in this crate")]
        let mut guard = self.state.lock().unwrap();
        self.advance_if_recovered(&mut guard);
        match &*guard {
            Internal::Closed { .. } => CircuitBreakerState::Closed,
            Internal::Open { .. } => CircuitBreakerState::Open,
            Internal::HalfOpen { .. } => CircuitBreakerState::HalfOpen,
        }
    }

    fn advance_if_recovered(&self, guard: &mut Internal) {
        if let Internal::Open { opened_at } = *guard {
            let elapsed = self.clock.utc().signed_duration_since(opened_at);
            let recovery = chrono::Duration::from_std(self.config.recovery_timeout)
                .unwrap_or(chrono::Duration::MAX);
            if elapsed >= recovery {
                *guard = Internal::HalfOpen {
                    probe_in_flight: false,
                };
            }
        }
    }

    /// Wrap an async operation with the breaker's admission and bookkeeping logic.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitError::Open`] without invoking `op` when the circuit
    /// is open or a half-open probe is already in flight. Returns
    /// [`CircuitError::Rejected`] when `op` itself fails (this also counts
    /// as a failure toward the breaker).
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitError::Open {
                retry_after_secs: self.config.recovery_timeout.as_secs(),
            });
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(CircuitError::Rejected(error))
            }
        }
    }

    /// Returns `true` if a call may proceed, reserving the half-open probe slot if applicable.
    fn admit(&self) -> bool {
        #[expect(clippy::unwrap_used, reason = "mutex is never poisoned in this crate")]
        let mut guard = self.state.lock().unwrap();
        self.advance_if_recovered(&mut guard);
        match &mut *guard {
            Internal::Closed { .. } => true,
            Internal::Open { .. } => false,
            Internal::HalfOpen { probe_in_flight } => {
                if *probe_in_flight {
                    false
                } else {
                    *probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        #[expect(clippy::unwrap_used, reason = "mutex is never poisoned in this crate")]
        let mut guard = self.state.lock().unwrap();
        *guard = Internal::Closed {
            consecutive_failures: 0,
        };
    }

    fn record_failure(&self) {
        #[expect(clippy::unwrap_used, reason = "mutex is never poisoned in this crate")]
        let mut guard = self.state.lock().unwrap();
        *guard = match &*guard {
            Internal::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    Internal::Open {
                        opened_at: self.clock.utc(),
                    }
                } else {
                    Internal::Closed {
                        consecutive_failures: failures,
                    }
                }
            }
            Internal::HalfOpen { .. } => Internal::Open {
                opened_at: self.clock.utc(),
            },
            Internal::Open { opened_at } => Internal::Open { opened_at: *opened_at },
        };
    }
}
