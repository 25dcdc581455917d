//! Outbound HTTP transport: the retrying fetch helper shared by every
//! source adapter.

mod fetcher;
mod probe;

pub use fetcher::{FetchError, HttpFetcher, RetryPolicy};
pub use probe::HttpUrlProbe;
