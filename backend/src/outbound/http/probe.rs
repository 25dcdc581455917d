//! HTTP-backed [`UrlProbe`] for the URL health-check sweep.
//!
//! A liveness probe only needs a status classification, so this issues a
//! bare `HEAD` request rather than going through [`super::HttpFetcher`]'s
//! retry/decode machinery.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::domain::maintenance::UrlProbe;
use crate::domain::ports::UrlCheckOutcome;

const PROBE_TIMEOUT_SECONDS: u64 = 10;

/// Issues a `HEAD` request and classifies the result per [`UrlCheckOutcome`].
pub struct HttpUrlProbe {
    client: Client,
}

impl HttpUrlProbe {
    /// Build a probe with a short, fixed timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying reqwest client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECONDS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl UrlProbe for HttpUrlProbe {
    async fn probe(&self, url: &str) -> UrlCheckOutcome {
        match self.client.head(url).send().await {
            Ok(response) => match response.status() {
                StatusCode::NOT_FOUND | StatusCode::GONE => UrlCheckOutcome::Gone,
                status if status.is_success() || status.is_redirection() => {
                    UrlCheckOutcome::Reachable
                }
                status => {
                    debug!(url, %status, "url probe returned a non-terminal status");
                    UrlCheckOutcome::Unreachable
                }
            },
            Err(error) => {
                debug!(url, %error, "url probe failed");
                UrlCheckOutcome::Unreachable
            }
        }
    }
}
