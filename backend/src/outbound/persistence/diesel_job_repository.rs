//! PostgreSQL-backed [`JobRepository`] adapter.
//!
//! Upsert pattern (pre-read, then `ON CONFLICT (hash) DO UPDATE`) and
//! transaction shape grounded on
//! `diesel_osm_ingestion_provenance_repository.rs`'s `conn.transaction(...)`
//! usage. The semantic-dedup neighbour lookup uses a raw `sql_query` with
//! pgvector's `<=>` cosine-distance operator, following the same
//! hand-written-SQL convention as that file's `UPSERT_POIS_SQL` rather than
//! leaning on Diesel's still-evolving nullable-vector expression DSL.

use chrono::{DateTime, Utc};
use diesel::OptionalExtension;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Double, Text};
use diesel_async::RunQueryDsl;
use pgvector::Vector;
use pgvector::sql_types::Vector as VectorSqlType;

use crate::domain::maintenance::MAX_CONSECUTIVE_UNREACHABLE;
use crate::domain::model::{Canton, ContractType, Job, Language, SalaryPeriod, Seniority};
use crate::domain::ports::{
    JobRepository, JobRepositoryError, PersistOutcome, SemanticSweepCandidate, UrlCheckCandidate,
    UrlCheckOutcome,
};

use super::diesel_helpers::{map_diesel_error_message, map_pool_error_message};
use super::models::{JobRow, NewJobRow};
use super::pool::{DbPool, PoolError};
use super::schema::jobs;

/// Cosine distance below which two embeddings are treated as the same
/// posting; corresponds to spec.md §4.E's 0.95 similarity threshold.
pub const SEMANTIC_DEDUP_THRESHOLD: f64 = 1.0 - 0.95;

/// Diesel-backed implementation of the job persistence port.
#[derive(Clone)]
pub struct DieselJobRepository {
    pool: DbPool,
}

impl DieselJobRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> JobRepositoryError {
    JobRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> JobRepositoryError {
    JobRepositoryError::query(map_diesel_error_message(error, "jobs operation"))
}

impl TryFrom<JobRow> for Job {
    type Error = JobRepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let salary_period = row
            .salary_period
            .as_deref()
            .map(|value| {
                SalaryPeriod::from_db_str(value).ok_or_else(|| {
                    JobRepositoryError::query(format!("unknown salary_period {value:?}"))
                })
            })
            .transpose()?;
        let language = row
            .language
            .as_deref()
            .map(|value| {
                Language::from_db_str(value)
                    .ok_or_else(|| JobRepositoryError::query(format!("unknown language {value:?}")))
            })
            .transpose()?;
        let seniority = row
            .seniority
            .as_deref()
            .map(|value| {
                Seniority::from_db_str(value)
                    .ok_or_else(|| JobRepositoryError::query(format!("unknown seniority {value:?}")))
            })
            .transpose()?;
        let contract_type = row
            .contract_type
            .as_deref()
            .map(|value| {
                ContractType::from_db_str(value).ok_or_else(|| {
                    JobRepositoryError::query(format!("unknown contract_type {value:?}"))
                })
            })
            .transpose()?;
        let canton = row
            .canton
            .as_deref()
            .map(|value| {
                Canton::from_code(value)
                    .ok_or_else(|| JobRepositoryError::query(format!("invalid canton code {value:?}")))
            })
            .transpose()?;

        Ok(Self {
            hash: row.hash,
            source: row.source,
            title: row.title,
            company: row.company,
            url: row.url,
            location: row.location,
            canton,
            description: row.description,
            description_snippet: row.description_snippet,
            salary_min_chf: row.salary_min_chf,
            salary_max_chf: row.salary_max_chf,
            salary_original: row.salary_original,
            salary_currency: row.salary_currency,
            salary_period,
            language,
            seniority,
            contract_type,
            remote: row.remote,
            tags: row.tags,
            logo: row.logo,
            employment_type: row.employment_type,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            is_active: row.is_active,
            fuzzy_hash: row.fuzzy_hash,
            duplicate_of: row.duplicate_of,
            embedding: row.embedding.map(|vector| vector.to_vec()),
        })
    }
}

fn to_insert_row(job: &Job) -> NewJobRow<'_> {
    NewJobRow {
        hash: &job.hash,
        source: &job.source,
        title: &job.title,
        company: &job.company,
        url: &job.url,
        location: &job.location,
        canton: job.canton.as_ref().map(Canton::as_str),
        description: &job.description,
        description_snippet: &job.description_snippet,
        salary_min_chf: job.salary_min_chf,
        salary_max_chf: job.salary_max_chf,
        salary_original: job.salary_original.as_deref(),
        salary_currency: job.salary_currency.as_deref(),
        salary_period: job.salary_period.map(SalaryPeriod::as_db_str),
        language: job.language.map(Language::as_db_str),
        seniority: job.seniority.map(Seniority::as_db_str),
        contract_type: job.contract_type.map(ContractType::as_db_str),
        remote: job.remote,
        tags: &job.tags,
        logo: job.logo.as_deref(),
        employment_type: job.employment_type.as_deref(),
        first_seen_at: job.first_seen_at,
        last_seen_at: job.last_seen_at,
        is_active: job.is_active,
        fuzzy_hash: &job.fuzzy_hash,
        duplicate_of: job.duplicate_of.as_deref(),
    }
}

const FIND_SEMANTIC_DUPLICATE_SQL: &str = r"
SELECT
    hash, source, title, company, url, location, canton, description, description_snippet,
    salary_min_chf, salary_max_chf, salary_original, salary_currency, salary_period,
    language, seniority, contract_type, remote, tags, logo, employment_type,
    first_seen_at, last_seen_at, is_active, fuzzy_hash, duplicate_of, embedding,
    consecutive_unreachable
FROM jobs
WHERE is_active = true
  AND duplicate_of IS NULL
  AND hash <> $1
  AND embedding IS NOT NULL
  AND embedding <=> $2 < $3
ORDER BY first_seen_at ASC
LIMIT 1
";

#[async_trait::async_trait]
impl JobRepository for DieselJobRepository {
    async fn upsert_job(&self, job: &Job) -> Result<bool, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Pre-read rather than relying on `RETURNING` to distinguish a fresh
        // insert from a reactivation: both paths return exactly one row
        // from `ON CONFLICT ... DO UPDATE`, so `RETURNING` alone cannot
        // tell them apart.
        let existed_before = jobs::table
            .find(&job.hash)
            .select(jobs::hash)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .is_some();

        let new_row = to_insert_row(job);
        diesel::insert_into(jobs::table)
            .values(&new_row)
            .on_conflict(jobs::hash)
            .do_update()
            .set((
                jobs::last_seen_at.eq(job.last_seen_at),
                jobs::is_active.eq(true),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(!existed_before)
    }

    async fn mark_duplicate(
        &self,
        hash: &str,
        canonical_hash: &str,
    ) -> Result<(), JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(jobs::table.find(hash))
            .set((
                jobs::duplicate_of.eq(Some(canonical_hash)),
                jobs::is_active.eq(false),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn persist_job_with_dedup(
        &self,
        job: &Job,
    ) -> Result<PersistOutcome, JobRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let new_row = to_insert_row(job);
        let job_hash = job.hash.clone();
        let job_last_seen_at = job.last_seen_at;
        let job_fuzzy_hash = job.fuzzy_hash.clone();
        let job_source = job.source.clone();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Per-job savepoint: the whole upsert-then-dedup unit commits or
        // rolls back atomically, so one poison record cannot roll back the
        // batch the orchestrator is persisting.
        conn.transaction(|conn| {
            async move {
                let existed_before = jobs::table
                    .find(&job_hash)
                    .select(jobs::hash)
                    .first::<String>(conn)
                    .await
                    .optional()?
                    .is_some();

                diesel::insert_into(jobs::table)
                    .values(&new_row)
                    .on_conflict(jobs::hash)
                    .do_update()
                    .set((
                        jobs::last_seen_at.eq(job_last_seen_at),
                        jobs::is_active.eq(true),
                    ))
                    .execute(conn)
                    .await?;

                let is_new = !existed_before;
                if !is_new {
                    return Ok(PersistOutcome {
                        is_new,
                        duplicate_of: None,
                    });
                }

                let duplicate_of = jobs::table
                    .filter(jobs::fuzzy_hash.eq(&job_fuzzy_hash))
                    .filter(jobs::source.ne(&job_source))
                    .filter(jobs::is_active.eq(true))
                    .filter(jobs::hash.ne(&job_hash))
                    .order(jobs::first_seen_at.asc())
                    .select(jobs::hash)
                    .first::<String>(conn)
                    .await
                    .optional()?;

                if let Some(canonical_hash) = &duplicate_of {
                    diesel::update(jobs::table.find(&job_hash))
                        .set((
                            jobs::duplicate_of.eq(Some(canonical_hash)),
                            jobs::is_active.eq(false),
                        ))
                        .execute(conn)
                        .await?;
                }

                Ok(PersistOutcome {
                    is_new,
                    duplicate_of,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn get_active_count(&self) -> Result<i64, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        jobs::table
            .filter(jobs::is_active.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn find_fuzzy_duplicate(
        &self,
        fuzzy_hash: &str,
        source: &str,
    ) -> Result<Option<Job>, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = jobs::table
            .filter(jobs::fuzzy_hash.eq(fuzzy_hash))
            .filter(jobs::source.ne(source))
            .filter(jobs::is_active.eq(true))
            .order(jobs::first_seen_at.asc())
            .select(JobRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_semantic_duplicate(
        &self,
        hash: &str,
        embedding: &[f32],
    ) -> Result<Option<Job>, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let vector = Vector::from(embedding.to_vec());
        let row = sql_query(FIND_SEMANTIC_DUPLICATE_SQL)
            .bind::<Text, _>(hash)
            .bind::<VectorSqlType, _>(vector)
            .bind::<Double, _>(SEMANTIC_DEDUP_THRESHOLD)
            .get_result::<JobRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn fetch_semantic_sweep_batch(
        &self,
        batch_size: i64,
    ) -> Result<Vec<SemanticSweepCandidate>, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = jobs::table
            .filter(jobs::is_active.eq(true))
            .filter(jobs::duplicate_of.is_null())
            .filter(jobs::embedding.is_not_null())
            .order(jobs::first_seen_at.asc())
            .limit(batch_size)
            .select((jobs::hash, jobs::first_seen_at, jobs::embedding))
            .load::<(String, DateTime<Utc>, Option<Vector>)>(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(hash, first_seen_at, embedding)| {
                embedding.map(|vector| SemanticSweepCandidate {
                    hash,
                    first_seen_at,
                    embedding: vector.to_vec(),
                })
            })
            .collect())
    }

    async fn fetch_active_jobs_for_url_check(
        &self,
        batch_size: i64,
    ) -> Result<Vec<UrlCheckCandidate>, JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = jobs::table
            .filter(jobs::is_active.eq(true))
            .order(jobs::last_seen_at.asc())
            .limit(batch_size)
            .select((jobs::hash, jobs::url, jobs::consecutive_unreachable))
            .load::<(String, String, i32)>(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|(hash, url, consecutive_unreachable)| {
                let consecutive_unreachable = u32::try_from(consecutive_unreachable)
                    .map_err(|_| JobRepositoryError::query("negative consecutive_unreachable"))?;
                Ok(UrlCheckCandidate {
                    hash,
                    url,
                    consecutive_unreachable,
                })
            })
            .collect()
    }

    async fn record_url_check_result(
        &self,
        hash: &str,
        outcome: UrlCheckOutcome,
    ) -> Result<(), JobRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        match outcome {
            UrlCheckOutcome::Reachable => {
                diesel::update(jobs::table.find(hash))
                    .set(jobs::consecutive_unreachable.eq(0))
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
            }
            UrlCheckOutcome::Gone => {
                diesel::update(jobs::table.find(hash))
                    .set((jobs::consecutive_unreachable.eq(0), jobs::is_active.eq(false)))
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
            }
            UrlCheckOutcome::Unreachable => {
                let threshold =
                    i32::try_from(MAX_CONSECUTIVE_UNREACHABLE).unwrap_or(i32::MAX);
                let row = jobs::table
                    .find(hash)
                    .select(jobs::consecutive_unreachable)
                    .first::<i32>(&mut conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error)?;
                let Some(current) = row else {
                    return Ok(());
                };
                let next = current.saturating_add(1);
                diesel::update(jobs::table.find(hash))
                    .set((
                        jobs::consecutive_unreachable.eq(next),
                        jobs::is_active.eq(next < threshold),
                    ))
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;

    fn sample_row() -> JobRow {
        let now = Utc::now();
        JobRow {
            hash: "h".to_owned(),
            source: "arbeitnow".to_owned(),
            title: "Engineer".to_owned(),
            company: "Acme".to_owned(),
            url: "https://example.com/1".to_owned(),
            location: "Zurich".to_owned(),
            canton: Some("ZH".to_owned()),
            description: String::new(),
            description_snippet: String::new(),
            salary_min_chf: None,
            salary_max_chf: None,
            salary_original: None,
            salary_currency: None,
            salary_period: Some("yearly".to_owned()),
            language: Some("de".to_owned()),
            seniority: Some("senior".to_owned()),
            contract_type: Some("full_time".to_owned()),
            remote: false,
            tags: Vec::new(),
            logo: None,
            employment_type: None,
            first_seen_at: now,
            last_seen_at: now,
            is_active: true,
            fuzzy_hash: "fh".to_owned(),
            duplicate_of: None,
            embedding: None,
            consecutive_unreachable: 0,
        }
    }

    #[rstest]
    fn row_converts_to_domain() {
        let job: Job = sample_row().try_into().expect("valid row");
        assert_eq!(job.hash, "h");
        assert_eq!(job.salary_period, Some(SalaryPeriod::Yearly));
        assert_eq!(job.language, Some(Language::De));
        assert_eq!(job.seniority, Some(Seniority::Senior));
        assert_eq!(job.contract_type, Some(ContractType::FullTime));
        assert_eq!(job.canton.map(|canton| canton.as_str().to_owned()), Some("ZH".to_owned()));
    }

    #[rstest]
    fn row_with_unknown_salary_period_fails_conversion() {
        let mut row = sample_row();
        row.salary_period = Some("fortnightly".to_owned());
        let result: Result<Job, _> = row.try_into();
        assert!(result.is_err());
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(error, JobRepositoryError::Connection { .. }));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let error = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(error, JobRepositoryError::Query { .. }));
    }
}
