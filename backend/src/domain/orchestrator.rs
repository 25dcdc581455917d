//! Two-phase fetch orchestrator: parallel adapter fetch, then sequential
//! per-adapter persistence.
//!
//! Phase 1 is grounded on `overpass_enrichment_worker`'s
//! `call_semaphore: Arc<Semaphore>` admission pattern, generalized from a
//! single source to a fan-out over every enabled adapter. Phase 2 is
//! grounded on `examples/original_source/backend/tasks/fetch_tasks.py`'s
//! `_fetch_providers_async`: per-job savepoint persistence, provider-order
//! walk, and the `{fetched, new, updated, dupes, errors}` counter shape.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::domain::adapter::{AdapterError, SourceAdapter};
use crate::domain::compliance::ComplianceEngine;
use crate::domain::deduplicator::compute_fuzzy_hash;
use crate::domain::normalizer::normalize;
use crate::domain::ports::{ComplianceRepository, JobRepository};

/// Bound on the number of adapters fetched concurrently in Phase 1.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 5;

/// Per-run outcome counters, matching spec.md §4.H / §8 scenario 6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of adapters that completed Phase 1 without a fetch error.
    pub providers: u32,
    /// Total raw records fetched across every adapter.
    pub fetched: u32,
    /// Newly inserted, non-duplicate rows.
    pub new: u32,
    /// Rows that already existed and were refreshed.
    pub updated: u32,
    /// Rows marked as a duplicate of an existing canonical row.
    pub dupes: u32,
    /// Adapter- or record-level failures encountered during the run.
    pub errors: u32,
}

struct AdapterFetchResult {
    source: String,
    records: Result<Vec<crate::domain::model::Job>, AdapterError>,
}

/// Orchestrates one scheduled ingestion run over a fixed set of adapters.
pub struct FetchOrchestrator<J, C> {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    job_repo: Arc<J>,
    compliance: ComplianceEngine<C>,
    fetch_concurrency: usize,
}

impl<J, C> FetchOrchestrator<J, C>
where
    J: JobRepository,
    C: ComplianceRepository,
{
    /// Build an orchestrator over `adapters`, bounding Phase 1 concurrency
    /// at `fetch_concurrency` (clamped to at least 1).
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        job_repo: Arc<J>,
        compliance: ComplianceEngine<C>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            adapters,
            job_repo,
            compliance,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Run one full fetch cycle: Phase 1 parallel fetch, Phase 2 sequential
    /// persist. Returns the run's summary counters; never fails outright —
    /// adapter and record failures are contained and counted.
    pub async fn run(&self, query: &str, location: &str) -> RunSummary {
        let fetch_results = self.fetch_all(query, location).await;
        self.persist_all(fetch_results).await
    }

    async fn fetch_all(&self, query: &str, location: &str) -> Vec<AdapterFetchResult> {
        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut handles = Vec::with_capacity(self.adapters.len());

        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let semaphore = Arc::clone(&semaphore);
            let query = query.to_owned();
            let location = location.to_owned();
            let compliance = self.compliance.clone();

            handles.push(tokio::spawn(async move {
                #[expect(
                    clippy::unwrap_used,
                    reason = "semaphore is never closed while handles are outstanding"
                )]
                let _permit = semaphore.acquire().await.unwrap();

                let source = adapter.source_name().to_owned();
                if !compliance.can_scrape(&source).await {
                    warn!(source, "adapter skipped: compliance disabled");
                    return AdapterFetchResult {
                        source,
                        records: Err(AdapterError::ComplianceDisabled {
                            source: adapter.source_name().to_owned(),
                        }),
                    };
                }

                let records = adapter.fetch_jobs(&query, &location).await;
                AdapterFetchResult { source, records }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    error!(%join_error, "adapter fetch task panicked");
                }
            }
        }
        results
    }

    async fn persist_all(&self, fetch_results: Vec<AdapterFetchResult>) -> RunSummary {
        let mut summary = RunSummary::default();

        for result in fetch_results {
            let records = match result.records {
                Ok(records) => {
                    summary.providers += 1;
                    records
                }
                Err(error) => {
                    warn!(source = result.source, %error, "adapter fetch failed");
                    summary.errors += 1;
                    continue;
                }
            };

            for mut job in records {
                normalize(&mut job);
                job.cap_tags();
                job.refresh_snippet();
                job.fuzzy_hash = compute_fuzzy_hash(&job.title, &job.company);

                match self.job_repo.persist_job_with_dedup(&job).await {
                    Ok(outcome) => {
                        summary.fetched += 1;
                        if outcome.duplicate_of.is_some() {
                            summary.dupes += 1;
                        } else if outcome.is_new {
                            summary.new += 1;
                        } else {
                            summary.updated += 1;
                        }
                    }
                    Err(error) => {
                        summary.errors += 1;
                        error!(source = result.source, %error, "failed to persist job");
                    }
                }
            }
        }

        info!(
            providers = summary.providers,
            fetched = summary.fetched,
            new = summary.new,
            updated = summary.updated,
            dupes = summary.dupes,
            errors = summary.errors,
            "fetch run complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use mockable::DefaultClock;
    use rstest::rstest;

    use super::*;
    use crate::domain::model::Job;
    use crate::domain::ports::{MockComplianceRepository, MockJobRepository};

    struct StubAdapter {
        name: &'static str,
        jobs: Vec<Job>,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source_name(&self) -> &str {
            self.name
        }

        async fn fetch_jobs(&self, _query: &str, _location: &str) -> Result<Vec<Job>, AdapterError> {
            if self.fail {
                return Err(AdapterError::Transport {
                    source: self.name.to_owned(),
                    message: "boom".to_owned(),
                });
            }
            Ok(self.jobs.clone())
        }

        fn stats_snapshot(
            &self,
            clock: &dyn mockable::Clock,
        ) -> crate::domain::adapter::AdapterStatsSnapshot {
            crate::domain::adapter::AdapterStatsSnapshot {
                total_fetched: 0,
                errors: 0,
                sampled_at: clock.utc(),
            }
        }
    }

    fn sample_job(source: &str, hash: &str) -> Job {
        let now = chrono::Utc::now();
        Job {
            hash: hash.to_owned(),
            source: source.to_owned(),
            title: "Engineer".to_owned(),
            company: "Acme".to_owned(),
            url: format!("https://example.com/{hash}"),
            location: "Zurich".to_owned(),
            canton: None,
            description: String::new(),
            description_snippet: String::new(),
            salary_min_chf: None,
            salary_max_chf: None,
            salary_original: None,
            salary_currency: None,
            salary_period: None,
            language: None,
            seniority: None,
            contract_type: None,
            remote: false,
            tags: Vec::new(),
            logo: None,
            employment_type: None,
            first_seen_at: now,
            last_seen_at: now,
            is_active: true,
            fuzzy_hash: String::new(),
            duplicate_of: None,
            embedding: None,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn isolates_adapter_failure_and_still_persists_others() {
        let mut compliance_repo = MockComplianceRepository::new();
        compliance_repo.expect_find().returning(|key| {
            let key = key.to_owned();
            Box::pin(async move {
                Ok(Some(crate::domain::model::SourceCompliance {
                    source_key: key,
                    method: crate::domain::model::ComplianceMethod::Api,
                    is_allowed: true,
                    robots_txt_ok: true,
                    rate_limit_seconds: 1.0,
                    max_requests_per_hour: None,
                    auto_disable_on_block: true,
                    consecutive_blocks: 0,
                    last_blocked_at: None,
                    tos_notes: None,
                }))
            })
        });

        let persisted = Arc::new(AtomicU32::new(0));
        let persisted_clone = Arc::clone(&persisted);
        let mut job_repo = MockJobRepository::new();
        job_repo.expect_persist_job_with_dedup().returning(move |_job| {
            persisted_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(crate::domain::ports::PersistOutcome {
                    is_new: true,
                    duplicate_of: None,
                })
            })
        });

        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubAdapter {
                name: "failing",
                jobs: Vec::new(),
                fail: true,
            }),
            Arc::new(StubAdapter {
                name: "ok",
                jobs: vec![
                    sample_job("ok", "a"),
                    sample_job("ok", "b"),
                    sample_job("ok", "c"),
                ],
                fail: false,
            }),
        ];

        let orchestrator = FetchOrchestrator::new(
            adapters,
            Arc::new(job_repo),
            ComplianceEngine::new(Arc::new(compliance_repo)),
            DEFAULT_FETCH_CONCURRENCY,
        );

        let fetch_results = orchestrator.fetch_all("software developer", "Switzerland").await;
        let summary = orchestrator.persist_all(fetch_results).await;

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.providers, 1);
        assert_eq!(summary.new, 3);
        assert_eq!(persisted.load(Ordering::SeqCst), 3);
        let _ = DefaultClock;
    }
}
