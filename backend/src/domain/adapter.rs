//! Source adapter abstraction: the static, typed replacement for the
//! original's `BaseJobProvider`/`BaseScraper` inheritance chain.
//!
//! Grounded on spec.md §9's REDESIGN FLAGS: composition over inheritance.
//! [`AdapterCore`] owns the per-source [`CircuitBreaker`] and fetch stats
//! that every concrete adapter needs; adapters hold one and implement
//! [`SourceAdapter`] to supply their source-specific fetch/normalize logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
use crate::domain::model::Job;

/// Fetch statistics tracked per adapter, surfaced to operators.
#[derive(Debug, Default)]
pub struct AdapterStats {
    total_fetched: AtomicU64,
    errors: AtomicU64,
}

impl AdapterStats {
    /// Record `count` freshly fetched raw records.
    pub fn record_fetched(&self, count: u64) {
        self.total_fetched.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one adapter-level error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total raw records fetched since process start.
    #[must_use]
    pub fn total_fetched(&self) -> u64 {
        self.total_fetched.load(Ordering::Relaxed)
    }

    /// Total adapter-level errors since process start.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Shared machinery every adapter composes rather than inherits: a
/// per-source circuit breaker and fetch statistics.
pub struct AdapterCore {
    source_name: String,
    circuit_breaker: CircuitBreaker,
    stats: AdapterStats,
}

impl AdapterCore {
    /// Build adapter-shared state for `source_name`.
    #[must_use]
    pub fn new(source_name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(source_name, clock, CircuitBreakerConfig::default())
    }

    /// Build adapter-shared state with an explicit circuit-breaker config.
    #[must_use]
    pub fn with_config(
        source_name: impl Into<String>,
        clock: Arc<dyn Clock>,
        circuit_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            circuit_breaker: CircuitBreaker::new(circuit_config, clock),
            stats: AdapterStats::default(),
        }
    }

    /// The adapter's unique, lowercase source identifier.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// This adapter's circuit breaker, wrapping every outbound call.
    #[must_use]
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// This adapter's fetch statistics.
    #[must_use]
    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }
}

/// A stamped view of an adapter's stats, returned by [`SourceAdapter::stats_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterStatsSnapshot {
    /// Total raw records fetched since process start.
    pub total_fetched: u64,
    /// Total adapter-level errors since process start.
    pub errors: u64,
    /// When this snapshot was taken.
    pub sampled_at: DateTime<Utc>,
}

/// A raw record extraction failure, distinct from a transport failure: the
/// response was received but could not be turned into a [`Job`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to normalize record from {source}: {message}")]
pub struct NormalizeError {
    /// Source adapter identifier.
    pub source: String,
    /// Human-readable cause.
    pub message: String,
}

/// Transport or protocol failure surfaced by [`SourceAdapter::fetch_jobs`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// The adapter's circuit breaker rejected the call outright.
    #[error("{source} circuit breaker is open, retry after {retry_after_secs}s")]
    CircuitOpen {
        /// Source adapter identifier.
        source: String,
        /// Hint for when the caller may retry.
        retry_after_secs: u64,
    },
    /// Compliance gating forbids this source right now.
    #[error("{source} is disabled by compliance policy")]
    ComplianceDisabled {
        /// Source adapter identifier.
        source: String,
    },
    /// A transport-level failure occurred while fetching.
    #[error("{source} transport error: {message}")]
    Transport {
        /// Source adapter identifier.
        source: String,
        /// Human-readable cause.
        message: String,
    },
    /// The response could not be parsed into records.
    #[error(transparent)]
    Parse(#[from] NormalizeError),
}

/// Map a [`CircuitError`] onto the [`AdapterError`] variant an adapter
/// returns from `fetch_jobs`, stamping the adapter's own `source_name` onto
/// it. A bare `From` impl cannot do this (it has no adapter to ask), so
/// every adapter calls this at its circuit-breaker call sites instead.
pub fn circuit_error_to_adapter_error<E: std::fmt::Display>(
    source: &str,
    error: CircuitError<E>,
) -> AdapterError {
    match error {
        CircuitError::Open { retry_after_secs } => AdapterError::CircuitOpen {
            source: source.to_owned(),
            retry_after_secs,
        },
        CircuitError::Rejected(inner) => AdapterError::Transport {
            source: source.to_owned(),
            message: inner.to_string(),
        },
    }
}

/// Source-specific fetch/normalize behaviour.
///
/// Adapters never write to the database; they return in-memory record
/// sequences only, matching §4.G's "forbidden from writing" constraint.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique, lowercase source identifier matching a `SourceCompliance` row.
    fn source_name(&self) -> &str;

    /// Fetch and normalize jobs for `query`/`location`.
    async fn fetch_jobs(&self, query: &str, location: &str) -> Result<Vec<Job>, AdapterError>;

    /// A point-in-time snapshot of this adapter's fetch statistics.
    fn stats_snapshot(&self, clock: &dyn Clock) -> AdapterStatsSnapshot;
}
