//! Periodic housekeeping sweeps: semantic deduplication and URL health.
//!
//! Grounded on `examples/original_source/backend/tasks/maintenance_tasks.py`,
//! which leaves both sweeps as stubs (`"not yet implemented"`), and on
//! `examples/original_source/backend/services/deduplicator.py`'s
//! `find_semantic_duplicates` for the semantic sweep's intent. Since
//! spec.md §4.J and §8 describe concrete, testable behaviour, both sweeps
//! are implemented fully here rather than ported as stubs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::ports::{JobRepository, UrlCheckOutcome};

/// Default batch size for the semantic-dedup sweep.
pub const DEFAULT_SEMANTIC_BATCH_SIZE: i64 = 500;

/// Default batch size for the URL health-check sweep.
pub const DEFAULT_URL_CHECK_BATCH_SIZE: i64 = 500;

/// A job's unreachable streak triggers deactivation once it reaches this
/// count, distinguishing transient network flakiness from a hard "gone"
/// signal (which deactivates immediately on the first 404/410).
pub const MAX_CONSECUTIVE_UNREACHABLE: u32 = 3;

/// Result counters for a single semantic-dedup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SemanticSweepSummary {
    /// Candidates considered.
    pub scanned: u32,
    /// Candidates newly marked as a duplicate.
    pub marked_duplicate: u32,
    /// Candidates that failed to process due to a repository error.
    pub errors: u32,
}

/// Result counters for a single URL health-check sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlCheckSummary {
    /// URLs probed.
    pub checked: u32,
    /// Jobs deactivated this sweep (gone, or unreachable streak exhausted).
    pub deactivated: u32,
    /// Probes that failed to record due to a repository error.
    pub errors: u32,
}

/// A minimal HTTP probe boundary for the URL health check, kept separate
/// from [`crate::outbound::http::HttpFetcher`] since a liveness probe only
/// needs a status classification, never a response body.
#[async_trait::async_trait]
pub trait UrlProbe: Send + Sync {
    /// Probe `url`, classifying the result per [`UrlCheckOutcome`].
    async fn probe(&self, url: &str) -> UrlCheckOutcome;
}

/// Semantic-dedup sweep: find near-duplicate postings across sources by
/// embedding similarity and fold them into their canonical row.
pub struct SemanticDedupSweep<R> {
    repo: Arc<R>,
    batch_size: i64,
}

impl<R: JobRepository> SemanticDedupSweep<R> {
    /// Build a sweep over `repo`, scanning up to `batch_size` candidates.
    #[must_use]
    pub fn new(repo: Arc<R>, batch_size: i64) -> Self {
        Self { repo, batch_size }
    }

    /// Run one sweep. Candidates are fetched oldest-`first_seen_at`-first,
    /// so when two rows are near-duplicates the earlier one is always
    /// treated as canonical and the later one is marked a duplicate of it.
    pub async fn run(&self) -> SemanticSweepSummary {
        let mut summary = SemanticSweepSummary::default();

        let batch = match self.repo.fetch_semantic_sweep_batch(self.batch_size).await {
            Ok(batch) => batch,
            Err(error) => {
                warn!(%error, "semantic sweep: failed to fetch batch");
                summary.errors += 1;
                return summary;
            }
        };

        for candidate in batch {
            summary.scanned += 1;
            let canonical = self
                .repo
                .find_semantic_duplicate(&candidate.hash, &candidate.embedding)
                .await;

            match canonical {
                Ok(Some(canonical)) => {
                    if let Err(error) = self
                        .repo
                        .mark_duplicate(&candidate.hash, &canonical.hash)
                        .await
                    {
                        warn!(%error, hash = candidate.hash, "semantic sweep: failed to mark duplicate");
                        summary.errors += 1;
                    } else {
                        summary.marked_duplicate += 1;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, hash = candidate.hash, "semantic sweep: lookup failed");
                    summary.errors += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            marked_duplicate = summary.marked_duplicate,
            errors = summary.errors,
            "semantic sweep complete"
        );
        summary
    }
}

/// URL health-check sweep: probe active postings and deactivate the ones
/// that are no longer reachable.
pub struct UrlHealthSweep<R, P> {
    repo: Arc<R>,
    probe: Arc<P>,
    batch_size: i64,
}

impl<R: JobRepository, P: UrlProbe> UrlHealthSweep<R, P> {
    /// Build a sweep over `repo`, probing with `probe`, up to `batch_size`
    /// candidates per run.
    #[must_use]
    pub fn new(repo: Arc<R>, probe: Arc<P>, batch_size: i64) -> Self {
        Self {
            repo,
            probe,
            batch_size,
        }
    }

    /// Run one sweep.
    pub async fn run(&self) -> UrlCheckSummary {
        let mut summary = UrlCheckSummary::default();

        let batch = match self
            .repo
            .fetch_active_jobs_for_url_check(self.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(error) => {
                warn!(%error, "url health sweep: failed to fetch batch");
                summary.errors += 1;
                return summary;
            }
        };

        for candidate in batch {
            summary.checked += 1;
            let outcome = self.probe.probe(&candidate.url).await;
            let deactivates = match outcome {
                UrlCheckOutcome::Gone => true,
                UrlCheckOutcome::Unreachable => {
                    candidate.consecutive_unreachable + 1 >= MAX_CONSECUTIVE_UNREACHABLE
                }
                UrlCheckOutcome::Reachable => false,
            };

            if let Err(error) = self
                .repo
                .record_url_check_result(&candidate.hash, outcome)
                .await
            {
                warn!(%error, hash = candidate.hash, "url health sweep: failed to record result");
                summary.errors += 1;
                continue;
            }
            if deactivates {
                summary.deactivated += 1;
            }
        }

        info!(
            checked = summary.checked,
            deactivated = summary.deactivated,
            errors = summary.errors,
            "url health sweep complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::model::Job;
    use crate::domain::ports::{MockJobRepository, SemanticSweepCandidate, UrlCheckCandidate};

    fn sample_job(hash: &str) -> Job {
        let now = Utc::now();
        Job {
            hash: hash.to_owned(),
            source: "arbeitnow".to_owned(),
            title: "Engineer".to_owned(),
            company: "Acme".to_owned(),
            url: "https://example.com/1".to_owned(),
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

    struct AlwaysReachable;

    #[async_trait::async_trait]
    impl UrlProbe for AlwaysReachable {
        async fn probe(&self, _url: &str) -> UrlCheckOutcome {
            UrlCheckOutcome::Reachable
        }
    }

    struct AlwaysGone;

    #[async_trait::async_trait]
    impl UrlProbe for AlwaysGone {
        async fn probe(&self, _url: &str) -> UrlCheckOutcome {
            UrlCheckOutcome::Gone
        }
    }

    struct AlwaysUnreachable;

    #[async_trait::async_trait]
    impl UrlProbe for AlwaysUnreachable {
        async fn probe(&self, _url: &str) -> UrlCheckOutcome {
            UrlCheckOutcome::Unreachable
        }
    }

    #[rstest]
    #[tokio::test]
    async fn semantic_sweep_marks_duplicate_against_canonical() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_semantic_sweep_batch().returning(|_| {
            Box::pin(async {
                Ok(vec![SemanticSweepCandidate {
                    hash: "newer".to_owned(),
                    first_seen_at: Utc::now(),
                    embedding: vec![0.1, 0.2, 0.3],
                }])
            })
        });
        repo.expect_find_semantic_duplicate()
            .returning(|_hash, _embedding| Box::pin(async { Ok(Some(sample_job("older"))) }));
        repo.expect_mark_duplicate()
            .withf(|hash, canonical| hash == "newer" && canonical == "older")
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let sweep = SemanticDedupSweep::new(Arc::new(repo), DEFAULT_SEMANTIC_BATCH_SIZE);
        let summary = sweep.run().await;

        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.marked_duplicate, 1);
        assert_eq!(summary.errors, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn semantic_sweep_leaves_unique_rows_untouched() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_semantic_sweep_batch().returning(|_| {
            Box::pin(async {
                Ok(vec![SemanticSweepCandidate {
                    hash: "solo".to_owned(),
                    first_seen_at: Utc::now(),
                    embedding: vec![0.1, 0.2, 0.3],
                }])
            })
        });
        repo.expect_find_semantic_duplicate()
            .returning(|_hash, _embedding| Box::pin(async { Ok(None) }));

        let sweep = SemanticDedupSweep::new(Arc::new(repo), DEFAULT_SEMANTIC_BATCH_SIZE);
        let summary = sweep.run().await;

        assert_eq!(summary.marked_duplicate, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn url_sweep_deactivates_immediately_on_gone() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_active_jobs_for_url_check().returning(|_| {
            Box::pin(async {
                Ok(vec![UrlCheckCandidate {
                    hash: "a".to_owned(),
                    url: "https://example.com/a".to_owned(),
                    consecutive_unreachable: 0,
                }])
            })
        });
        repo.expect_record_url_check_result()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let sweep = UrlHealthSweep::new(
            Arc::new(repo),
            Arc::new(AlwaysGone),
            DEFAULT_URL_CHECK_BATCH_SIZE,
        );
        let summary = sweep.run().await;

        assert_eq!(summary.deactivated, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn url_sweep_tolerates_transient_unreachable_below_threshold() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_active_jobs_for_url_check().returning(|_| {
            Box::pin(async {
                Ok(vec![UrlCheckCandidate {
                    hash: "a".to_owned(),
                    url: "https://example.com/a".to_owned(),
                    consecutive_unreachable: 1,
                }])
            })
        });
        repo.expect_record_url_check_result()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let sweep = UrlHealthSweep::new(
            Arc::new(repo),
            Arc::new(AlwaysUnreachable),
            DEFAULT_URL_CHECK_BATCH_SIZE,
        );
        let summary = sweep.run().await;

        assert_eq!(summary.deactivated, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn url_sweep_deactivates_after_third_consecutive_unreachable() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_active_jobs_for_url_check().returning(|_| {
            Box::pin(async {
                Ok(vec![UrlCheckCandidate {
                    hash: "a".to_owned(),
                    url: "https://example.com/a".to_owned(),
                    consecutive_unreachable: 2,
                }])
            })
        });
        repo.expect_record_url_check_result()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let sweep = UrlHealthSweep::new(
            Arc::new(repo),
            Arc::new(AlwaysUnreachable),
            DEFAULT_URL_CHECK_BATCH_SIZE,
        );
        let summary = sweep.run().await;

        assert_eq!(summary.deactivated, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn url_sweep_leaves_reachable_untouched() {
        let mut repo = MockJobRepository::new();
        repo.expect_fetch_active_jobs_for_url_check().returning(|_| {
            Box::pin(async {
                Ok(vec![UrlCheckCandidate {
                    hash: "a".to_owned(),
                    url: "https://example.com/a".to_owned(),
                    consecutive_unreachable: 2,
                }])
            })
        });
        repo.expect_record_url_check_result()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let sweep = UrlHealthSweep::new(
            Arc::new(repo),
            Arc::new(AlwaysReachable),
            DEFAULT_URL_CHECK_BATCH_SIZE,
        );
        let summary = sweep.run().await;

        assert_eq!(summary.deactivated, 0);
    }
}
