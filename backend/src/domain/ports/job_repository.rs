//! The [`JobRepository`] port: idempotent upsert and duplicate bookkeeping
//! for [`Job`] rows.

use async_trait::async_trait;

use crate::domain::model::Job;
use crate::domain::ports::define_port_error;

define_port_error! {
    /// Failure modes surfaced by a [`JobRepository`] implementation.
    pub enum JobRepositoryError {
        /// The connection pool or database link is unavailable.
        Connection { message: String } => "job repository unavailable: {message}",
        /// A query failed for a reason other than connectivity.
        Query { message: String } => "job repository query failed: {message}",
    }
}

/// A batch of active jobs due for a URL liveness check, oldest-checked first.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlCheckCandidate {
    /// Primary key of the job to probe.
    pub hash: String,
    /// URL to issue a `HEAD` request against.
    pub url: String,
    /// Consecutive unreachable results recorded so far.
    pub consecutive_unreachable: u32,
}

/// Outcome of a single URL liveness probe, as recorded by
/// [`JobRepository::record_url_check_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlCheckOutcome {
    /// The URL responded successfully; any unreachable streak is cleared.
    Reachable,
    /// The URL returned 404/410; the job is deactivated immediately.
    Gone,
    /// The request timed out or the connection failed.
    Unreachable,
}

/// Outcome of [`JobRepository::persist_job_with_dedup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Whether the row did not exist before this call.
    pub is_new: bool,
    /// Set when a same-tick fuzzy duplicate was found and `mark_duplicate`
    /// was applied within the same savepoint.
    pub duplicate_of: Option<String>,
}

/// A candidate pair considered for semantic deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticSweepCandidate {
    /// Primary key of the row under consideration.
    pub hash: String,
    /// Timestamp of first sighting, used to resolve which row is canonical.
    pub first_seen_at: chrono::DateTime<chrono::Utc>,
    /// The normalized embedding vector, always present for swept rows.
    pub embedding: Vec<f32>,
}

/// Idempotent persistence boundary for [`Job`] rows.
///
/// Port errors are narrow by design (connection vs. query); the caller maps
/// them to the coarse-grained [`crate::domain::error::Error`] at the service
/// boundary, mirroring the teacher's `map_bundle_repository_error` pattern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or refresh a job sighting.
    ///
    /// Returns `true` iff the row did not exist before this call. On a
    /// reactivation (row existed but `is_active` was false), `last_seen_at`
    /// and `is_active` are refreshed but `duplicate_of` is left untouched.
    async fn upsert_job(&self, job: &Job) -> Result<bool, JobRepositoryError>;

    /// Mark `hash` as a duplicate of `canonical_hash`, deactivating it.
    /// Idempotent: calling this again with the same arguments is a no-op.
    async fn mark_duplicate(
        &self,
        hash: &str,
        canonical_hash: &str,
    ) -> Result<(), JobRepositoryError>;

    /// Upsert `job`, then — if newly inserted — look up a same-tick fuzzy
    /// duplicate from a different source and mark it, all within a single
    /// per-job savepoint so one poison record cannot roll back the batch.
    ///
    /// This is the orchestrator's Phase 2 atomic unit (§4.H): the caller has
    /// already run the normalizer and computed `job.fuzzy_hash` outside the
    /// transaction boundary.
    async fn persist_job_with_dedup(
        &self,
        job: &Job,
    ) -> Result<PersistOutcome, JobRepositoryError>;

    /// Count of rows currently marked active.
    async fn get_active_count(&self) -> Result<i64, JobRepositoryError>;

    /// Find an existing active row sharing `fuzzy_hash` but sourced from a
    /// different adapter than `source`, returning the oldest such match.
    async fn find_fuzzy_duplicate(
        &self,
        fuzzy_hash: &str,
        source: &str,
    ) -> Result<Option<Job>, JobRepositoryError>;

    /// Find an active, non-duplicate row whose embedding lies within the
    /// semantic-dedup cosine threshold of `embedding`, excluding `hash`
    /// itself, preferring the earliest `first_seen_at`.
    async fn find_semantic_duplicate(
        &self,
        hash: &str,
        embedding: &[f32],
    ) -> Result<Option<Job>, JobRepositoryError>;

    /// Fetch up to `batch_size` active, non-duplicate rows with embeddings,
    /// ordered by `first_seen_at` ascending, for the semantic-dedup sweep.
    async fn fetch_semantic_sweep_batch(
        &self,
        batch_size: i64,
    ) -> Result<Vec<SemanticSweepCandidate>, JobRepositoryError>;

    /// Fetch up to `batch_size` active jobs due for a URL health check.
    async fn fetch_active_jobs_for_url_check(
        &self,
        batch_size: i64,
    ) -> Result<Vec<UrlCheckCandidate>, JobRepositoryError>;

    /// Record the outcome of a URL health probe, deactivating the job when
    /// the outcome warrants it.
    async fn record_url_check_result(
        &self,
        hash: &str,
        outcome: UrlCheckOutcome,
    ) -> Result<(), JobRepositoryError>;
}
