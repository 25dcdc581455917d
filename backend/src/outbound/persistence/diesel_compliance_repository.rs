//! PostgreSQL-backed [`ComplianceRepository`] adapter.
//!
//! Grounded on `diesel_osm_ingestion_provenance_repository.rs`'s pool/error
//! mapping shape. `report_block`/`reset_blocks` run as a single
//! atomic `UPDATE ... RETURNING` statement (Diesel's `.get_result`) rather
//! than a read-then-write round trip, satisfying spec.md §5's
//! "transactional read-modify-write" requirement for concurrently-updated
//! `source_compliance` rows without an explicit row lock.

use diesel::OptionalExtension;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Int4, Text};
use diesel_async::RunQueryDsl;

use crate::domain::model::{ComplianceMethod, SourceCompliance};
use crate::domain::ports::{ComplianceRepository, ComplianceRepositoryError};

use super::diesel_helpers::{map_diesel_error_message, map_pool_error_message};
use super::models::SourceComplianceRow;
use super::pool::{DbPool, PoolError};
use super::schema::source_compliance;

/// Atomically bump the block counter and trip the kill-switch in one
/// statement: the `CASE` expression sees the post-increment count, so a
/// concurrent caller can never observe the bump without the disable.
const REPORT_BLOCK_SQL: &str = r"
UPDATE source_compliance
SET
    consecutive_blocks = consecutive_blocks + 1,
    last_blocked_at = now(),
    is_allowed = CASE
        WHEN auto_disable_on_block AND consecutive_blocks + 1 >= $2 THEN false
        ELSE is_allowed
    END
WHERE source_key = $1
RETURNING
    source_key, method, is_allowed, robots_txt_ok, rate_limit_seconds,
    max_requests_per_hour, auto_disable_on_block, consecutive_blocks,
    last_blocked_at, tos_notes
";

/// Diesel-backed implementation of the compliance port.
#[derive(Clone)]
pub struct DieselComplianceRepository {
    pool: DbPool,
}

impl DieselComplianceRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ComplianceRepositoryError {
    ComplianceRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> ComplianceRepositoryError {
    ComplianceRepositoryError::query(map_diesel_error_message(
        error,
        "source_compliance operation",
    ))
}

impl TryFrom<SourceComplianceRow> for SourceCompliance {
    type Error = ComplianceRepositoryError;

    fn try_from(row: SourceComplianceRow) -> Result<Self, Self::Error> {
        let method = ComplianceMethod::from_db_str(&row.method).ok_or_else(|| {
            ComplianceRepositoryError::query(format!(
                "unknown compliance method {:?} for source {}",
                row.method, row.source_key
            ))
        })?;
        let consecutive_blocks = u32::try_from(row.consecutive_blocks).map_err(|_| {
            ComplianceRepositoryError::query(format!(
                "negative consecutive_blocks for source {}",
                row.source_key
            ))
        })?;
        let max_requests_per_hour = row
            .max_requests_per_hour
            .map(u32::try_from)
            .transpose()
            .map_err(|_| {
                ComplianceRepositoryError::query(format!(
                    "negative max_requests_per_hour for source {}",
                    row.source_key
                ))
            })?;

        Ok(Self {
            source_key: row.source_key,
            method,
            is_allowed: row.is_allowed,
            robots_txt_ok: row.robots_txt_ok,
            rate_limit_seconds: row.rate_limit_seconds,
            max_requests_per_hour,
            auto_disable_on_block: row.auto_disable_on_block,
            consecutive_blocks,
            last_blocked_at: row.last_blocked_at,
            tos_notes: row.tos_notes,
        })
    }
}

#[async_trait::async_trait]
impl ComplianceRepository for DieselComplianceRepository {
    async fn find(
        &self,
        source_key: &str,
    ) -> Result<Option<SourceCompliance>, ComplianceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = source_compliance::table
            .find(source_key)
            .select(SourceComplianceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn report_block(
        &self,
        source_key: &str,
        kill_switch_threshold: u32,
    ) -> Result<Option<SourceCompliance>, ComplianceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let threshold = i32::try_from(kill_switch_threshold).unwrap_or(i32::MAX);

        let row = sql_query(REPORT_BLOCK_SQL)
            .bind::<Text, _>(source_key)
            .bind::<Int4, _>(threshold)
            .get_result::<SourceComplianceRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn reset_blocks(&self, source_key: &str) -> Result<(), ComplianceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(source_compliance::table.find(source_key))
            .set(source_compliance::consecutive_blocks.eq(0))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SourceCompliance>, ComplianceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = source_compliance::table
            .select(SourceComplianceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample_row() -> SourceComplianceRow {
        SourceComplianceRow {
            source_key: "jobicy".to_owned(),
            method: "api".to_owned(),
            is_allowed: true,
            robots_txt_ok: true,
            rate_limit_seconds: 1.0,
            max_requests_per_hour: Some(120),
            auto_disable_on_block: true,
            consecutive_blocks: 2,
            last_blocked_at: None,
            tos_notes: None,
        }
    }

    #[rstest]
    fn row_converts_to_domain() {
        let compliance: SourceCompliance = sample_row().try_into().expect("valid row");
        assert_eq!(compliance.source_key, "jobicy");
        assert_eq!(compliance.method, ComplianceMethod::Api);
        assert_eq!(compliance.consecutive_blocks, 2);
        assert_eq!(compliance.max_requests_per_hour, Some(120));
    }

    #[rstest]
    fn row_with_unknown_method_fails_conversion() {
        let mut row = sample_row();
        row.method = "carrier-pigeon".to_owned();
        let result: Result<SourceCompliance, _> = row.try_into();
        assert!(result.is_err());
    }

    #[rstest]
    fn row_with_negative_consecutive_blocks_fails_conversion() {
        let mut row = sample_row();
        row.consecutive_blocks = -1;
        let result: Result<SourceCompliance, _> = row.try_into();
        assert!(result.is_err());
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(error, ComplianceRepositoryError::Connection { .. }));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let error = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(error, ComplianceRepositoryError::Query { .. }));
    }
}
