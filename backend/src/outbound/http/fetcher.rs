//! Retrying HTTP fetch helper shared by every source adapter.
//!
//! Grounded on `backend/src/outbound/overpass/http_source.rs` (reqwest
//! client construction, status-to-error mapping, body preview truncation)
//! and `examples/original_source/backend/utils/http.py`'s
//! `fetch_with_retry`/`fetch_rss` (retry-status set, exponential backoff
//! formula, JSON-or-text entry points).

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_FACTOR_SECONDS: f64 = 1.0;
const DEFAULT_MAX_RETRY_DELAY_SECONDS: f64 = 30.0;
const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

/// Status codes that trigger a retry with backoff rather than an immediate
/// failure.
const RETRY_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Failure returned once a fetch has exhausted its retry budget or hit a
/// non-retryable error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The request timed out on every attempt.
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout {
        /// The URL that was requested.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },
    /// A non-retryable 4xx response (other than 429) was returned.
    #[error("request to {url} failed with status {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status returned.
        status: u16,
    },
    /// Every retry attempt was exhausted against a retryable status/error.
    #[error("request to {url} failed after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// The URL that was requested.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Human-readable cause of the final attempt's failure.
        message: String,
        /// The final HTTP status observed, when the last attempt got a
        /// response at all (as opposed to a transport-level timeout).
        status: Option<u16>,
    },
    /// The response body could not be decoded as the requested shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// The URL that was requested.
        url: String,
        /// Human-readable decode failure.
        message: String,
    },
}

impl FetchError {
    /// The HTTP status this failure ultimately carried, if any was observed.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { status, .. } => *status,
            Self::Timeout { .. } | Self::Decode { .. } => None,
        }
    }

    /// Whether this failure looks like the source blocking us (403/429),
    /// the signal scrapers react to per the compliance kill-switch.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.status(), Some(403 | 429))
    }
}

/// Retry/backoff policy for a single [`HttpFetcher`] call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff multiplier, in seconds.
    pub backoff_factor: f64,
    /// Ceiling on a single backoff delay, in seconds.
    pub max_retry_delay_seconds: f64,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR_SECONDS,
            max_retry_delay_seconds: DEFAULT_MAX_RETRY_DELAY_SECONDS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl RetryPolicy {
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = 2f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let seconds = (self.backoff_factor * exponent).min(self.max_retry_delay_seconds);
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

/// Retrying request helper wrapping a single [`reqwest::Client`].
///
/// Two entry points mirror the original's: [`HttpFetcher::fetch_json`] for
/// JSON APIs, [`HttpFetcher::fetch_text`] for RSS/XML/HTML bodies.
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// Build a fetcher with the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying reqwest client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_policy(RetryPolicy::default())
    }

    /// Build a fetcher with an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying reqwest client cannot be built.
    pub fn with_policy(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(policy.timeout).build()?;
        Ok(Self { client, policy })
    }

    /// GET (or POST with an optional JSON body) `url` with exponential
    /// backoff retry, decoding a successful response as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once retries are exhausted or a non-retryable
    /// status/decode failure occurs.
    pub async fn fetch_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        json_body: Option<&B>,
    ) -> Result<Value, FetchError> {
        let body = self
            .fetch_with_retry(method, url, query, json_body)
            .await?;
        serde_json::from_slice(&body).map_err(|error| FetchError::Decode {
            url: url.to_owned(),
            message: error.to_string(),
        })
    }

    /// GET `url` with exponential backoff retry, returning the raw response
    /// text (used for RSS/Atom/HTML bodies).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once retries are exhausted or a non-retryable
    /// status is returned.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .fetch_with_retry::<()>(Method::GET, url, &[], None)
            .await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_with_retry<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        json_body: Option<&B>,
    ) -> Result<Vec<u8>, FetchError> {
        let max_attempts = self.policy.max_retries + 1;

        for attempt in 0..max_attempts {
            let mut request = self.client.request(method.clone(), url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let (Method::POST, Some(body)) = (&method, json_body) {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if RETRY_STATUSES.contains(&status) && attempt + 1 < max_attempts {
                        let wait = self.policy.backoff_delay(attempt);
                        warn!(%status, url, wait_secs = wait.as_secs_f64(), "retrying after status");
                        sleep(wait).await;
                        continue;
                    }

                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(FetchError::Status {
                            url: url.to_owned(),
                            status: status.as_u16(),
                        });
                    }

                    if !status.is_success() {
                        if attempt + 1 == max_attempts {
                            return Err(FetchError::RetriesExhausted {
                                url: url.to_owned(),
                                attempts: attempt + 1,
                                message: format!("status {status}"),
                                status: Some(status.as_u16()),
                            });
                        }
                        let wait = self.policy.backoff_delay(attempt);
                        sleep(wait).await;
                        continue;
                    }

                    return response
                        .bytes()
                        .await
                        .map(|bytes| bytes.to_vec())
                        .map_err(|error| FetchError::RetriesExhausted {
                            url: url.to_owned(),
                            attempts: attempt + 1,
                            message: error.to_string(),
                            status: Some(status.as_u16()),
                        });
                }
                Err(error) if error.is_timeout() || error.is_connect() => {
                    if attempt + 1 == max_attempts {
                        return Err(FetchError::Timeout {
                            url: url.to_owned(),
                            attempts: attempt + 1,
                        });
                    }
                    let wait = self.policy.backoff_delay(attempt);
                    sleep(wait).await;
                }
                Err(error) => {
                    if attempt + 1 == max_attempts {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_owned(),
                            attempts: attempt + 1,
                            message: error.to_string(),
                            status: None,
                        });
                    }
                    let wait = self.policy.backoff_delay(attempt);
                    sleep(wait).await;
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_owned(),
            attempts: max_attempts,
            message: "retry loop exited without a terminal result".to_owned(),
            status: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff_factor: 0.01,
            max_retry_delay_seconds: 0.05,
            timeout: Duration::from_secs(5),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_json_succeeds_on_first_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let url = format!("{}/jobs", server.uri());
        let body = fetcher
            .fetch_json::<()>(Method::GET, &url, &[], None)
            .await
            .expect("fetch succeeds");
        assert_eq!(body, serde_json::json!({"data": []}));
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_json_retries_on_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let url = format!("{}/flaky", server.uri());
        let body = fetcher
            .fetch_json::<()>(Method::GET, &url, &[], None)
            .await
            .expect("fetch eventually succeeds");
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_json_does_not_retry_non_429_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let url = format!("{}/missing", server.uri());
        let error = fetcher
            .fetch_json::<()>(Method::GET, &url, &[], None)
            .await
            .expect_err("404 should not retry");
        assert!(matches!(error, FetchError::Status { status: 404, .. }));
        assert!(!error.is_blocked());
    }

    #[rstest]
    #[tokio::test]
    async fn retries_exhausted_on_429_reports_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let url = format!("{}/throttled", server.uri());
        let error = fetcher
            .fetch_text(&url)
            .await
            .expect_err("429 exhausts retries");
        assert_eq!(error.status(), Some(429));
        assert!(error.is_blocked());
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_text_returns_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss></rss>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let url = format!("{}/feed.xml", server.uri());
        let text = fetcher.fetch_text(&url).await.expect("fetch succeeds");
        assert_eq!(text, "<rss></rss>");
    }
}
