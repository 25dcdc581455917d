//! Shared helpers for Diesel repository implementations.
//!
//! Scoped down to what [`super::diesel_job_repository`] and
//! [`super::diesel_compliance_repository`] actually need: pool/diesel error
//! message extraction. Both repositories use upsert-on-conflict rather than
//! optimistic-concurrency revisions, so the teacher's
//! `HasRevision`/`save_with_revision!` machinery has no counterpart here.

use tracing::debug;

use super::pool::PoolError;

/// Extract a readable message from a pool error.
pub fn map_pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// Extract a readable message from a Diesel error and emit debug context.
pub fn map_diesel_error_message(error: diesel::result::Error, operation: &str) -> String {
    let error_message = error.to_string();
    debug!(%error_message, %operation, "diesel operation failed");
    error_message
}
