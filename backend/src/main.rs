#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), forbid(clippy::expect_used))]
//! Ingestion worker entry-point.
//!
//! Loads configuration once, wires the Diesel-backed repositories, the
//! per-source adapters, and the scheduler, then drains scheduled
//! [`Command`]s onto the fetch orchestrator and maintenance sweeps. A
//! minimal health server runs alongside the worker loop so orchestration
//! platforms can probe readiness and liveness independently of run cadence.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr};
use mockable::{Clock, DefaultClock};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use backend::api::health::HealthState;
use backend::domain::adapter::SourceAdapter;
use backend::domain::compliance::ComplianceEngine;
use backend::domain::config::Config;
use backend::domain::maintenance::{
    SemanticDedupSweep, UrlHealthSweep, DEFAULT_SEMANTIC_BATCH_SIZE, DEFAULT_URL_CHECK_BATCH_SIZE,
};
use backend::domain::orchestrator::FetchOrchestrator;
use backend::domain::scheduler::{Command, Scheduler, SchedulerConfig};
use backend::outbound::adapters::{ArbeitnowAdapter, FinancejobsAdapter};
use backend::outbound::http::{HttpFetcher, HttpUrlProbe, RetryPolicy};
use backend::outbound::persistence::{
    DbPool, DieselComplianceRepository, DieselJobRepository, PoolConfig,
};
use backend::server::{create_server, ServerConfig};

/// How often the scheduler checks the trigger table for due work.
const SCHEDULER_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Depth of the scheduler-to-worker command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

fn init_tracing() {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        eprintln!("tracing init failed: {error}");
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = Config::from_env().wrap_err("failed to load configuration from environment")?;

    let pool_config = PoolConfig::new(config.database_url())
        .with_max_size(config.db_pool().max_size)
        .with_min_idle(Some(config.db_pool().min_idle));
    let pool = DbPool::new(pool_config)
        .await
        .wrap_err("failed to build database connection pool")?;

    let job_repo = Arc::new(DieselJobRepository::new(pool.clone()));
    let compliance_repo = Arc::new(DieselComplianceRepository::new(pool));
    let compliance = ComplianceEngine::new(compliance_repo);

    let http_timeouts = config.http_timeouts();
    let provider_fetcher = HttpFetcher::with_policy(RetryPolicy {
        timeout: http_timeouts.listing,
        ..RetryPolicy::default()
    })
    .wrap_err("failed to build provider HTTP client")?;
    let scraper_fetcher = HttpFetcher::with_policy(RetryPolicy {
        timeout: http_timeouts.heavy,
        ..RetryPolicy::default()
    })
    .wrap_err("failed to build scraper HTTP client")?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    // Providers (API-backed) and scrapers (HTML) run under separate
    // orchestrators so the scheduler's `fetch_providers`/`fetch_scrapers`
    // triggers can fire on independent cadences, per spec.md §4.I.
    let provider_adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(ArbeitnowAdapter::new(
        provider_fetcher,
        Arc::clone(&clock),
    ))];
    let scraper_adapters: Vec<Arc<dyn SourceAdapter>> =
        vec![Arc::new(FinancejobsAdapter::with_compliance_reporter(
            scraper_fetcher,
            Arc::clone(&clock),
            Arc::new(compliance.clone()),
        ))];

    let provider_orchestrator = FetchOrchestrator::new(
        provider_adapters,
        Arc::clone(&job_repo),
        compliance.clone(),
        config.fetch_concurrency(),
    );
    let scraper_orchestrator = FetchOrchestrator::new(
        scraper_adapters,
        Arc::clone(&job_repo),
        compliance.clone(),
        config.fetch_concurrency(),
    );

    let semantic_sweep =
        SemanticDedupSweep::new(Arc::clone(&job_repo), DEFAULT_SEMANTIC_BATCH_SIZE);
    let url_probe =
        Arc::new(HttpUrlProbe::new().wrap_err("failed to build URL health-check client")?);
    let url_sweep =
        UrlHealthSweep::new(Arc::clone(&job_repo), url_probe, DEFAULT_URL_CHECK_BATCH_SIZE);

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), ServerConfig::new(config.bind_addr()))
        .wrap_err("failed to bind operational health server")?;

    let scheduler_settings = config.scheduler();
    let (sender, mut receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    let scheduler_handle = if scheduler_settings.enabled {
        let scheduler_config = SchedulerConfig {
            fetch_interval_minutes: scheduler_settings.fetch_interval_minutes,
            scraper_interval_hours: scheduler_settings.scraper_interval_hours,
            search_interval_minutes: scheduler_settings.search_interval_minutes,
        };
        let mut scheduler = Scheduler::new(
            scheduler_config,
            sender,
            SCHEDULER_POLL_INTERVAL,
            chrono::Utc::now(),
        )
        .wrap_err("failed to build scheduler trigger table")?;
        Some(tokio::spawn(async move { scheduler.run().await }))
    } else {
        info!("scheduler disabled; worker will only serve health checks");
        drop(sender);
        None
    };

    let worker_loop = async move {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::FetchProviders => {
                    let summary = provider_orchestrator.run("", "").await;
                    info!(?summary, "provider fetch run complete");
                }
                Command::FetchScrapers => {
                    let summary = scraper_orchestrator.run("", "").await;
                    info!(?summary, "scraper fetch run complete");
                }
                Command::DedupSemantic => {
                    let summary = semantic_sweep.run().await;
                    info!(?summary, "semantic dedup sweep complete");
                }
                Command::CheckJobUrls => {
                    let summary = url_sweep.run().await;
                    info!(?summary, "url health sweep complete");
                }
                Command::RunSavedSearches => {
                    warn!(
                        "run_saved_searches triggered; saved-search re-execution is a \
                         downstream consumer concern and is not run by this worker"
                    );
                }
            }
        }
    };

    tokio::select! {
        result = server => {
            result.wrap_err("operational health server exited unexpectedly")?;
        }
        () = worker_loop => {
            info!("command channel closed, worker loop exiting");
        }
    }

    if let Some(handle) = scheduler_handle {
        handle.abort();
    }

    Ok(())
}
