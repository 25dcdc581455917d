//! Domain ports: narrow, mockable boundaries between the domain services and
//! their outbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod compliance_repository;
mod job_repository;

#[cfg(test)]
pub use compliance_repository::MockComplianceRepository;
pub use compliance_repository::{ComplianceRepository, ComplianceRepositoryError};
#[cfg(test)]
pub use job_repository::MockJobRepository;
pub use job_repository::{
    JobRepository, JobRepositoryError, PersistOutcome, SemanticSweepCandidate, UrlCheckCandidate,
    UrlCheckOutcome,
};
