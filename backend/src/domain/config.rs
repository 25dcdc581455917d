//! Process configuration, loaded once from the environment at startup.
//!
//! Mirrors the teacher's `main.rs` style of small `fn load_x_from_env() ->
//! Result<X, ConfigError>` helpers rather than a derive-based config crate:
//! `Config::from_env` is called exactly once in `main`, and the resulting
//! value is handed to the scheduler and orchestrator by reference, never
//! re-read mid-run (the "global settings object" redesign note).

use std::collections::HashMap;
use std::env::{self, VarError};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DB_MIN_IDLE: u32 = 2;
const DEFAULT_FETCH_CONCURRENCY: usize = 5;
const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_CIRCUIT_RECOVERY_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_LISTING_TIMEOUT_SECONDS: u64 = 15;
const DEFAULT_HEAVY_TIMEOUT_SECONDS: u64 = 30;
const CREDENTIAL_ENV_PREFIX: &str = "PROVIDER_CREDENTIAL_";

/// Failures loading [`Config`] from the environment.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A required variable was not set.
    #[error("missing required environment variable {name}")]
    Missing {
        /// The variable's name.
        name: &'static str,
    },
    /// A variable was set but not valid UTF-8.
    #[error("environment variable {name} is not valid UTF-8")]
    NotUnicode {
        /// The variable's name.
        name: &'static str,
    },
    /// A variable was set but could not be parsed into the expected shape.
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid {
        /// The variable's name.
        name: &'static str,
        /// The raw value that failed to parse.
        value: String,
        /// Human-readable parse failure.
        reason: String,
    },
}

fn read_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { name }),
    }
}

fn load_required_string(name: &'static str) -> Result<String, ConfigError> {
    read_var(name)?.ok_or(ConfigError::Missing { name })
}

fn load_string_with_default(name: &'static str, default: &str) -> Result<String, ConfigError> {
    Ok(read_var(name)?.unwrap_or_else(|| default.to_owned()))
}

fn load_bool_with_default(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match read_var(name)? {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value,
                reason: "expected a boolean (true/false/1/0/yes/no/on/off)".to_owned(),
            }),
        },
    }
}

fn load_parsed_with_default<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match read_var(name)? {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|error: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: error.to_string(),
        }),
    }
}

fn load_bind_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = load_string_with_default(name, default)?;
    raw.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected a host:port socket address".to_owned(),
        })
}

/// Per-provider credentials, read from `PROVIDER_CREDENTIAL_<SOURCE_NAME>`
/// variables (e.g. `PROVIDER_CREDENTIAL_JOOBLE`). An adapter whose
/// credential is unset is silently disabled and logged at startup, per
/// spec.md §6's "key-gated API providers" contract.
fn load_provider_credentials() -> HashMap<String, String> {
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(CREDENTIAL_ENV_PREFIX)
                .map(|source| (source.to_ascii_lowercase(), value))
        })
        .collect()
}

/// Database connection pool sizing, read once at startup.
#[derive(Debug, Clone, Copy)]
pub struct DbPoolSettings {
    /// Maximum number of connections in the pool.
    pub max_size: u32,
    /// Minimum number of idle connections to maintain.
    pub min_idle: u32,
}

/// Per-source circuit breaker tunables, shared across all adapters; a
/// per-source override would require per-adapter environment variables not
/// enumerated in spec.md §6, so every adapter is built with the same values.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the breaker trips to `Open`.
    pub failure_threshold: u32,
    /// How long the breaker stays `Open` before allowing a probe.
    pub recovery_timeout: Duration,
}

/// HTTP timeouts applied to outbound fetches.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    /// Timeout for ordinary listing-page requests.
    pub listing: Duration,
    /// Timeout for heavier payloads (e.g. detail pages, large feeds).
    pub heavy: Duration,
}

/// Scheduler enable flag and the three configurable trigger intervals;
/// the two maintenance triggers (`dedup_semantic`, `check_job_urls`) run on
/// a fixed daily/weekly cron schedule per spec.md §4.I and are not
/// configurable here.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Whether the scheduler loop runs at all.
    pub enabled: bool,
    /// Minutes between provider-fetch triggers.
    pub fetch_interval_minutes: u64,
    /// Hours between scraper-fetch triggers.
    pub scraper_interval_hours: u64,
    /// Minutes between saved-search triggers.
    pub search_interval_minutes: u64,
}

/// Immutable process configuration, loaded once from the environment.
///
/// Constructed with [`Config::from_env`] in `main` and passed by reference
/// to the scheduler and orchestrator; never re-read mid-run.
#[derive(Debug, Clone)]
pub struct Config {
    database_url: String,
    bind_addr: SocketAddr,
    db_pool: DbPoolSettings,
    fetch_concurrency: usize,
    circuit_breaker: CircuitBreakerSettings,
    http_timeouts: HttpTimeouts,
    scheduler: SchedulerSettings,
    provider_credentials: HashMap<String, String>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a set
    /// variable cannot be parsed into its expected shape.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = load_required_string("DATABASE_URL")?;
        let bind_addr = load_bind_addr("BIND_ADDR", DEFAULT_BIND_ADDR)?;

        let db_pool = DbPoolSettings {
            max_size: load_parsed_with_default("DB_POOL_MAX_SIZE", DEFAULT_DB_MAX_CONNECTIONS)?,
            min_idle: load_parsed_with_default("DB_POOL_MIN_IDLE", DEFAULT_DB_MIN_IDLE)?,
        };

        let fetch_concurrency =
            load_parsed_with_default("FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?;

        let circuit_breaker = CircuitBreakerSettings {
            failure_threshold: load_parsed_with_default(
                "CIRCUIT_FAILURE_THRESHOLD",
                DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            )?,
            recovery_timeout: Duration::from_secs(load_parsed_with_default(
                "CIRCUIT_RECOVERY_TIMEOUT_SECONDS",
                DEFAULT_CIRCUIT_RECOVERY_TIMEOUT_SECONDS,
            )?),
        };

        let http_timeouts = HttpTimeouts {
            listing: Duration::from_secs(load_parsed_with_default(
                "HTTP_LISTING_TIMEOUT_SECONDS",
                DEFAULT_LISTING_TIMEOUT_SECONDS,
            )?),
            heavy: Duration::from_secs(load_parsed_with_default(
                "HTTP_HEAVY_TIMEOUT_SECONDS",
                DEFAULT_HEAVY_TIMEOUT_SECONDS,
            )?),
        };

        let scheduler = SchedulerSettings {
            enabled: load_bool_with_default("SCHEDULER_ENABLED", true)?,
            fetch_interval_minutes: load_parsed_with_default(
                "FETCH_INTERVAL_MINUTES",
                u64::from(crate::domain::scheduler::DEFAULT_FETCH_INTERVAL_MINUTES),
            )?,
            scraper_interval_hours: load_parsed_with_default(
                "SCRAPER_INTERVAL_HOURS",
                u64::from(crate::domain::scheduler::DEFAULT_SCRAPER_INTERVAL_HOURS),
            )?,
            search_interval_minutes: load_parsed_with_default(
                "SEARCH_INTERVAL_MINUTES",
                u64::from(crate::domain::scheduler::DEFAULT_SEARCH_INTERVAL_MINUTES),
            )?,
        };

        Ok(Self {
            database_url,
            bind_addr,
            db_pool,
            fetch_concurrency,
            circuit_breaker,
            http_timeouts,
            scheduler,
            provider_credentials: load_provider_credentials(),
        })
    }

    /// The Postgres connection string.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// The socket address the operational health server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Database connection pool sizing.
    #[must_use]
    pub fn db_pool(&self) -> DbPoolSettings {
        self.db_pool
    }

    /// Maximum number of adapters fetched concurrently in a single run.
    #[must_use]
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    /// Circuit breaker tunables shared across every adapter.
    #[must_use]
    pub fn circuit_breaker(&self) -> CircuitBreakerSettings {
        self.circuit_breaker
    }

    /// Outbound HTTP timeouts.
    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        self.http_timeouts
    }

    /// Scheduler enable flag and configurable trigger intervals.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerSettings {
        self.scheduler
    }

    /// Look up a key-gated provider's credential by its lowercase source
    /// name. Returns `None` when the corresponding
    /// `PROVIDER_CREDENTIAL_<SOURCE_NAME>` variable is unset, in which case
    /// the adapter should be skipped and the skip logged at startup.
    #[must_use]
    pub fn provider_credential(&self, source_name: &str) -> Option<&str> {
        self.provider_credentials
            .get(source_name)
            .map(String::as_str)
    }
}
