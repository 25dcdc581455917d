//! Compliance kill-switch: the gate every adapter must pass before issuing
//! an outbound request.
//!
//! Grounded on `examples/original_source/backend/services/compliance.py`'s
//! consecutive-block counter and kill-switch threshold of 3, combined with
//! the teacher's habit of mapping an ambiguous failure into a safe decision
//! rather than bubbling an error up through the call chain.

use std::sync::Arc;

use tracing::warn;

use crate::domain::model::SourceCompliance;
use crate::domain::ports::{ComplianceRepository, ComplianceRepositoryError};

/// Number of consecutive blocks after which `auto_disable_on_block` sources
/// are automatically disabled.
pub const KILL_SWITCH_THRESHOLD: u32 = 3;

/// Compliance gate wrapping a [`ComplianceRepository`].
///
/// Held behind a generic type parameter over a concrete repository, matching
/// the teacher's `OfflineBundleCommandService<R, I>` convention rather than
/// a trait object.
#[derive(Clone)]
pub struct ComplianceEngine<R> {
    repo: Arc<R>,
}

impl<R: ComplianceRepository> ComplianceEngine<R> {
    /// Build an engine over `repo`.
    #[must_use]
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Returns `is_allowed && robots_txt_ok` for `source_key`.
    ///
    /// Unknown sources, and any database failure while looking one up,
    /// resolve to `false`: the gate fails closed rather than open.
    pub async fn can_scrape(&self, source_key: &str) -> bool {
        match self.repo.find(source_key).await {
            Ok(Some(compliance)) => compliance.is_allowed && compliance.robots_txt_ok,
            Ok(None) => false,
            Err(error) => {
                warn!(source = source_key, %error, "compliance lookup failed, failing closed");
                false
            }
        }
    }

    /// Record a block response (e.g. HTTP 403/429) from `source_key`.
    ///
    /// Idempotent for unknown sources: the repository simply reports no row
    /// to update. Propagates only genuine repository failures; callers that
    /// wish to fail closed on error should treat an `Err` the same as a
    /// blocked source.
    pub async fn report_block(
        &self,
        source_key: &str,
    ) -> Result<Option<SourceCompliance>, ComplianceRepositoryError> {
        self.repo
            .report_block(source_key, KILL_SWITCH_THRESHOLD)
            .await
    }

    /// Zero the consecutive-block counter for `source_key` after a verified
    /// success.
    pub async fn reset_blocks(&self, source_key: &str) -> Result<(), ComplianceRepositoryError> {
        self.repo.reset_blocks(source_key).await
    }

    /// Read-only snapshot of every known source's compliance posture.
    pub async fn get_compliance_status(
        &self,
    ) -> Result<Vec<SourceCompliance>, ComplianceRepositoryError> {
        self.repo.list_all().await
    }
}

/// Narrow, object-safe slice of [`ComplianceEngine`] that scraper adapters
/// hold directly, since adapters are stored as `Arc<dyn SourceAdapter>` and
/// cannot be generic over a repository type the way services are.
#[async_trait::async_trait]
pub trait ComplianceReporter: Send + Sync {
    /// See [`ComplianceEngine::report_block`].
    async fn report_block(&self, source_key: &str) -> Result<(), ComplianceRepositoryError>;
    /// See [`ComplianceEngine::reset_blocks`].
    async fn reset_blocks(&self, source_key: &str) -> Result<(), ComplianceRepositoryError>;
}

#[async_trait::async_trait]
impl<R: ComplianceRepository> ComplianceReporter for ComplianceEngine<R> {
    async fn report_block(&self, source_key: &str) -> Result<(), ComplianceRepositoryError> {
        self.repo
            .report_block(source_key, KILL_SWITCH_THRESHOLD)
            .await
            .map(|_| ())
    }

    async fn reset_blocks(&self, source_key: &str) -> Result<(), ComplianceRepositoryError> {
        self.repo.reset_blocks(source_key).await
    }
}
