//! Operator CLI: run a single scheduled [`Command`] on demand, bypassing the
//! scheduler's trigger table. Intended for manual backfills and on-call
//! investigation (`trigger-run fetch-providers`, `trigger-run dedup-semantic`).

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use mockable::{Clock, DefaultClock};
use tracing_subscriber::{fmt, EnvFilter};

use backend::domain::adapter::SourceAdapter;
use backend::domain::compliance::ComplianceEngine;
use backend::domain::config::Config;
use backend::domain::maintenance::{
    SemanticDedupSweep, UrlHealthSweep, DEFAULT_SEMANTIC_BATCH_SIZE, DEFAULT_URL_CHECK_BATCH_SIZE,
};
use backend::domain::orchestrator::FetchOrchestrator;
use backend::domain::scheduler::Command;
use backend::outbound::adapters::{ArbeitnowAdapter, FinancejobsAdapter};
use backend::outbound::http::{HttpFetcher, HttpUrlProbe, RetryPolicy};
use backend::outbound::persistence::{
    DbPool, DieselComplianceRepository, DieselJobRepository, PoolConfig,
};

/// One of the scheduler's triggers, named as its CLI-friendly kebab-case form.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunCommand {
    FetchProviders,
    FetchScrapers,
    DedupSemantic,
    CheckJobUrls,
}

impl From<RunCommand> for Command {
    fn from(value: RunCommand) -> Self {
        match value {
            RunCommand::FetchProviders => Command::FetchProviders,
            RunCommand::FetchScrapers => Command::FetchScrapers,
            RunCommand::DedupSemantic => Command::DedupSemantic,
            RunCommand::CheckJobUrls => Command::CheckJobUrls,
        }
    }
}

/// Trigger a single ingestion or maintenance run outside the scheduler loop.
#[derive(Debug, Parser)]
#[command(name = "trigger-run")]
struct Cli {
    /// Which scheduled trigger to run once.
    command: RunCommand,

    /// Search query passed to provider/scraper adapters (ignored by maintenance commands).
    #[arg(long, default_value = "")]
    query: String,

    /// Location filter passed to provider/scraper adapters (ignored by maintenance commands).
    #[arg(long, default_value = "")]
    location: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        eprintln!("tracing init failed: {error}");
    }

    let cli = Cli::parse();
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

    match Command::from(cli.command) {
        Command::FetchProviders => {
            let fetcher = HttpFetcher::with_policy(RetryPolicy {
                timeout: config.http_timeouts().listing,
                ..RetryPolicy::default()
            })
            .wrap_err("failed to build provider HTTP client")?;
            let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
            let adapters: Vec<Arc<dyn SourceAdapter>> =
                vec![Arc::new(ArbeitnowAdapter::new(fetcher, clock))];
            let orchestrator = FetchOrchestrator::new(
                adapters,
                job_repo,
                compliance,
                config.fetch_concurrency(),
            );
            let summary = orchestrator.run(&cli.query, &cli.location).await;
            println!("{summary:?}");
        }
        Command::FetchScrapers => {
            let fetcher = HttpFetcher::with_policy(RetryPolicy {
                timeout: config.http_timeouts().heavy,
                ..RetryPolicy::default()
            })
            .wrap_err("failed to build scraper HTTP client")?;
            let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
            let adapters: Vec<Arc<dyn SourceAdapter>> =
                vec![Arc::new(FinancejobsAdapter::with_compliance_reporter(
                    fetcher,
                    clock,
                    Arc::new(compliance.clone()),
                ))];
            let orchestrator = FetchOrchestrator::new(
                adapters,
                job_repo,
                compliance,
                config.fetch_concurrency(),
            );
            let summary = orchestrator.run(&cli.query, &cli.location).await;
            println!("{summary:?}");
        }
        Command::DedupSemantic => {
            let sweep = SemanticDedupSweep::new(job_repo, DEFAULT_SEMANTIC_BATCH_SIZE);
            let summary = sweep.run().await;
            println!("{summary:?}");
        }
        Command::CheckJobUrls => {
            let probe =
                Arc::new(HttpUrlProbe::new().wrap_err("failed to build URL health-check client")?);
            let sweep = UrlHealthSweep::new(job_repo, probe, DEFAULT_URL_CHECK_BATCH_SIZE);
            let summary = sweep.run().await;
            println!("{summary:?}");
        }
        Command::RunSavedSearches => unreachable!("not exposed as a CLI subcommand"),
    }

    Ok(())
}
