//! The [`ComplianceRepository`] port backing [`crate::domain::compliance::ComplianceEngine`].

use async_trait::async_trait;

use crate::domain::model::SourceCompliance;
use crate::domain::ports::define_port_error;

define_port_error! {
    /// Failure modes surfaced by a [`ComplianceRepository`] implementation.
    pub enum ComplianceRepositoryError {
        /// The connection pool or database link is unavailable.
        Connection { message: String } => "compliance repository unavailable: {message}",
        /// A query failed for a reason other than connectivity.
        Query { message: String } => "compliance repository query failed: {message}",
    }
}

/// Persistence boundary for [`SourceCompliance`] rows.
///
/// `report_block` and `reset_blocks` must be atomic read-modify-write
/// operations: concurrent adapters may call them on the same `source_key`
/// in the same scheduler tick.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComplianceRepository: Send + Sync {
    /// Fetch the compliance row for `source_key`, if one exists.
    async fn find(
        &self,
        source_key: &str,
    ) -> Result<Option<SourceCompliance>, ComplianceRepositoryError>;

    /// Atomically increment `consecutive_blocks`, stamp `last_blocked_at`,
    /// and — if `auto_disable_on_block` and the new count reaches the
    /// kill-switch threshold — set `is_allowed = false`. Returns the
    /// updated row, or `None` if `source_key` is unknown.
    async fn report_block(
        &self,
        source_key: &str,
        kill_switch_threshold: u32,
    ) -> Result<Option<SourceCompliance>, ComplianceRepositoryError>;

    /// Atomically zero `consecutive_blocks` after a verified success.
    async fn reset_blocks(&self, source_key: &str) -> Result<(), ComplianceRepositoryError>;

    /// Read-only snapshot of every known source's compliance posture.
    async fn list_all(&self) -> Result<Vec<SourceCompliance>, ComplianceRepositoryError>;
}
