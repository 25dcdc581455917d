//! Integration tests for [`DieselJobRepository`] against a real embedded
//! Postgres, exercising the upsert-idempotence and reactivation properties
//! from spec.md §8 that unit tests (which only exercise row<->domain
//! conversion and error mapping) cannot cover.

#[path = "support/pg_embed.rs"]
mod pg_embed;

mod support;

use backend::domain::model::Job;
use backend::domain::ports::JobRepository;
use backend::outbound::persistence::{DbPool, DieselJobRepository, PoolConfig};
use chrono::{DateTime, Utc};
use support::handle_cluster_setup_failure;

fn sample_job(hash: &str, url: &str, first_seen_at: DateTime<Utc>) -> Job {
    Job {
        hash: hash.to_owned(),
        source: "arbeitnow".to_owned(),
        title: "Engineer".to_owned(),
        company: "Acme".to_owned(),
        url: url.to_owned(),
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
        first_seen_at,
        last_seen_at: first_seen_at,
        is_active: true,
        fuzzy_hash: "fh-engineer-acme".to_owned(),
        duplicate_of: None,
        embedding: None,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_and_reactivates_deduplicated_rows() {
    let cluster = match pg_embed::shared_cluster() {
        Ok(cluster) => cluster,
        Err(reason) => {
            handle_cluster_setup_failure::<()>(reason);
            return;
        }
    };
    let database = match support::provision_template_database(cluster) {
        Ok(db) => db,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err);
            return;
        }
    };

    let pool = match DbPool::new(PoolConfig::new(database.url())).await {
        Ok(pool) => pool,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err.to_string());
            return;
        }
    };
    let repo = DieselJobRepository::new(pool);

    let first_seen = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("fixed timestamp parses")
        .with_timezone(&Utc);
    let job = sample_job("hash-1", "https://example.com/job/1", first_seen);

    // First sighting: the row does not exist yet.
    let is_new = repo
        .upsert_job(&job)
        .await
        .expect("first upsert succeeds");
    assert!(is_new, "first sighting of a hash must be reported as new");

    // Second sighting of the same hash: idempotent, not new.
    let later_seen = first_seen + chrono::Duration::hours(1);
    let mut resighted = job.clone();
    resighted.last_seen_at = later_seen;
    let is_new_again = repo
        .upsert_job(&resighted)
        .await
        .expect("second upsert succeeds");
    assert!(
        !is_new_again,
        "re-upserting an existing hash must not be reported as new"
    );

    // Deactivate via mark_duplicate, then re-upsert: re-activation must
    // flip is_active back to true without clearing duplicate_of (per
    // DESIGN.md's Open Question decision #2).
    repo.mark_duplicate("hash-1", "hash-canonical")
        .await
        .expect("mark_duplicate succeeds");

    let is_new_after_dedup = repo
        .upsert_job(&resighted)
        .await
        .expect("reactivating upsert succeeds");
    assert!(
        !is_new_after_dedup,
        "reactivating a deduplicated row is still not a new row"
    );

    let active_count = repo
        .get_active_count()
        .await
        .expect("active count query succeeds");
    assert_eq!(
        active_count, 1,
        "the reactivated row must count as active again"
    );
}

#[tokio::test]
async fn persist_job_with_dedup_marks_cross_source_fuzzy_duplicate() {
    let cluster = match pg_embed::shared_cluster() {
        Ok(cluster) => cluster,
        Err(reason) => {
            handle_cluster_setup_failure::<()>(reason);
            return;
        }
    };
    let database = match support::provision_template_database(cluster) {
        Ok(db) => db,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err);
            return;
        }
    };

    let pool = match DbPool::new(PoolConfig::new(database.url())).await {
        Ok(pool) => pool,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err.to_string());
            return;
        }
    };
    let repo = DieselJobRepository::new(pool);

    let first_seen = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("fixed timestamp parses")
        .with_timezone(&Utc);

    let mut canonical = sample_job("hash-canonical", "https://jobicy.example/job/1", first_seen);
    canonical.source = "jobicy".to_owned();
    repo.upsert_job(&canonical)
        .await
        .expect("canonical upsert succeeds");

    let mut duplicate = sample_job(
        "hash-duplicate",
        "https://jooble.example/job/1",
        first_seen + chrono::Duration::minutes(5),
    );
    duplicate.source = "jooble".to_owned();
    // Same fuzzy_hash as `canonical` — simulating "Python Developer" at
    // "Acme" arriving from a second source, per spec.md §8 scenario 3.

    let outcome = repo
        .persist_job_with_dedup(&duplicate)
        .await
        .expect("persist_job_with_dedup succeeds");
    assert!(outcome.is_new, "first sighting of hash-duplicate is new");
    assert_eq!(
        outcome.duplicate_of.as_deref(),
        Some("hash-canonical"),
        "a same-tick fuzzy duplicate from a different source must be marked"
    );

    let active_count = repo
        .get_active_count()
        .await
        .expect("active count query succeeds");
    assert_eq!(
        active_count, 1,
        "the duplicate row must be deactivated, leaving only the canonical active"
    );
}

#[tokio::test]
async fn persist_job_with_dedup_ignores_same_source_fuzzy_match() {
    let cluster = match pg_embed::shared_cluster() {
        Ok(cluster) => cluster,
        Err(reason) => {
            handle_cluster_setup_failure::<()>(reason);
            return;
        }
    };
    let database = match support::provision_template_database(cluster) {
        Ok(db) => db,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err);
            return;
        }
    };

    let pool = match DbPool::new(PoolConfig::new(database.url())).await {
        Ok(pool) => pool,
        Err(err) => {
            handle_cluster_setup_failure::<()>(err.to_string());
            return;
        }
    };
    let repo = DieselJobRepository::new(pool);

    let first_seen = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("fixed timestamp parses")
        .with_timezone(&Utc);

    let first = sample_job("hash-a", "https://arbeitnow.example/job/1", first_seen);
    repo.upsert_job(&first).await.expect("first upsert succeeds");

    let resurfaced = sample_job(
        "hash-b",
        "https://arbeitnow.example/job/1-repost",
        first_seen + chrono::Duration::minutes(5),
    );
    // Same `source` and same `fuzzy_hash` as `first` — an adapter
    // resurfacing its own listing must never be treated as a duplicate,
    // per spec.md §4.E / §8's same-source rule.

    let outcome = repo
        .persist_job_with_dedup(&resurfaced)
        .await
        .expect("persist_job_with_dedup succeeds");
    assert!(outcome.is_new);
    assert_eq!(
        outcome.duplicate_of, None,
        "same-source fuzzy matches must never be deduplicated"
    );

    let active_count = repo
        .get_active_count()
        .await
        .expect("active count query succeeds");
    assert_eq!(active_count, 2, "both same-source rows remain active");
}
