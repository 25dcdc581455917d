//! Concrete [`crate::domain::adapter::SourceAdapter`] implementations.
//!
//! Two worked examples are carried as the pattern for any further adapter:
//! [`arbeitnow::ArbeitnowAdapter`] (a JSON API provider) and
//! [`financejobs::FinancejobsAdapter`] (an HTML scraper reading an embedded
//! JSON blob). Further sources follow the same shape: own an
//! [`crate::domain::adapter::AdapterCore`], a shared [`crate::outbound::http::HttpFetcher`],
//! and implement `SourceAdapter::fetch_jobs`.

pub mod arbeitnow;
pub mod financejobs;

pub use arbeitnow::ArbeitnowAdapter;
pub use financejobs::FinancejobsAdapter;
