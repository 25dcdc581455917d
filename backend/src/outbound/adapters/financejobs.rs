//! Financejobs.ch HTML scraper.
//!
//! Grounded on `examples/original_source/backend/scrapers/financejobs.py`:
//! the listing page embeds a Next.js `__NEXT_DATA__` JSON blob at
//! `props.initialProps.pageProps.jobsSSR.jobs`, which is more reliable to
//! parse than the rendered DOM. `FETCH_DETAILS` is false for this source —
//! the blob already carries everything normalization needs.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::domain::adapter::{
    circuit_error_to_adapter_error, AdapterCore, AdapterError, AdapterStatsSnapshot, SourceAdapter,
};
use crate::domain::circuit_breaker::CircuitError;
use crate::domain::compliance::ComplianceReporter;
use crate::domain::deduplicator::compute_exact_hash;
use crate::domain::model::Job;
use crate::domain::normalizer::{extract_canton, extract_job_skills, strip_html_tags};
use crate::outbound::http::HttpFetcher;

const SOURCE_NAME: &str = "financejobs";
const BASE_URL: &str = "https://www.financejobs.ch";
const MAX_PAGES: u32 = 10;
const PAGE_SIZE: usize = 20;
const RATE_LIMIT: Duration = Duration::from_millis(2000);

#[derive(Debug, Default, Deserialize)]
struct NextData {
    #[serde(default)]
    props: NextProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextProps {
    #[serde(default, rename = "initialProps")]
    initial_props: NextInitialProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextInitialProps {
    #[serde(default, rename = "pageProps")]
    page_props: NextPageProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextPageProps {
    #[serde(default, rename = "jobsSSR")]
    jobs_ssr: JobsSsr,
}

#[derive(Debug, Default, Deserialize)]
struct JobsSsr {
    #[serde(default)]
    jobs: Vec<RawListing>,
}

#[derive(Debug, Default, Deserialize)]
struct RawListing {
    #[serde(default, rename = "jobId")]
    job_id: Option<String>,
    #[serde(default, rename = "jcJobId")]
    jc_job_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "companyName")]
    company_name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    workload: Option<String>,
    #[serde(default)]
    salary: Option<String>,
}

/// HTML scraper adapter for financejobs.ch.
pub struct FinancejobsAdapter {
    core: AdapterCore,
    fetcher: HttpFetcher,
    clock: Arc<dyn Clock>,
    compliance: Option<Arc<dyn ComplianceReporter>>,
    base_url: String,
}

impl FinancejobsAdapter {
    /// Build the adapter over a shared [`HttpFetcher`] and clock, without
    /// reporting blocks back to the compliance engine.
    #[must_use]
    pub fn new(fetcher: HttpFetcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            core: AdapterCore::new(SOURCE_NAME, clock.clone()),
            fetcher,
            clock,
            compliance: None,
            base_url: BASE_URL.to_owned(),
        }
    }

    /// Build the adapter with a [`ComplianceReporter`] wired in: a 403/429
    /// response reports a block and aborts the run immediately; a run that
    /// completes all pages without being blocked resets the counter.
    ///
    /// Scoped to scrapers rather than API-backed adapters, since only
    /// scraping is subject to `robots.txt`/ToS block signals (spec.md §4.G).
    #[must_use]
    pub fn with_compliance_reporter(
        fetcher: HttpFetcher,
        clock: Arc<dyn Clock>,
        compliance: Arc<dyn ComplianceReporter>,
    ) -> Self {
        Self {
            core: AdapterCore::new(SOURCE_NAME, clock.clone()),
            fetcher,
            clock,
            compliance: Some(compliance),
            base_url: BASE_URL.to_owned(),
        }
    }

    fn build_listing_url(&self, page: u32) -> String {
        format!("{}/de/jobs?page={page}", self.base_url)
    }

    fn parse_listing_page(html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("script#__NEXT_DATA__") else {
            return Vec::new();
        };
        let Some(script) = document.select(&selector).next() else {
            warn!(source = SOURCE_NAME, "no __NEXT_DATA__ found");
            return Vec::new();
        };
        let text: String = script.text().collect();
        match serde_json::from_str::<NextData>(&text) {
            Ok(data) => data.props.initial_props.page_props.jobs_ssr.jobs,
            Err(error) => {
                warn!(source = SOURCE_NAME, %error, "failed to parse __NEXT_DATA__");
                Vec::new()
            }
        }
    }

    fn normalize_job(&self, raw: RawListing) -> Option<Job> {
        let job_id = raw.job_id.or(raw.jc_job_id).filter(|id| !id.is_empty())?;
        let title = strip_html_tags(&raw.title).trim().to_owned();
        let url = format!("{}/de/job/{job_id}", self.base_url);
        if title.is_empty() {
            return None;
        }
        let company = {
            let trimmed = raw.company_name.trim();
            if trimmed.is_empty() {
                "Unknown".to_owned()
            } else {
                trimmed.to_owned()
            }
        };
        let description = strip_html_tags(raw.description.or(raw.summary).unwrap_or_default().as_str());
        let location = raw.location.trim().to_owned();
        let tags = extract_job_skills(&title, &description);
        let description_snippet: String = description.chars().take(200).collect();
        let now = self.clock.utc();

        Some(Job {
            hash: compute_exact_hash(&title, &company, &url),
            source: SOURCE_NAME.to_owned(),
            canton: extract_canton(&location),
            title,
            company,
            url,
            location,
            description,
            description_snippet,
            salary_min_chf: None,
            salary_max_chf: None,
            salary_original: raw.salary,
            salary_currency: None,
            salary_period: None,
            language: None,
            seniority: None,
            contract_type: None,
            remote: false,
            tags,
            logo: None,
            employment_type: raw.workload,
            first_seen_at: now,
            last_seen_at: now,
            is_active: true,
            fuzzy_hash: String::new(),
            duplicate_of: None,
            embedding: None,
        })
    }
}

#[async_trait]
impl SourceAdapter for FinancejobsAdapter {
    fn source_name(&self) -> &str {
        self.core.source_name()
    }

    async fn fetch_jobs(&self, _query: &str, _location: &str) -> Result<Vec<Job>, AdapterError> {
        let mut results = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.build_listing_url(page);
            let fetcher = &self.fetcher;
            let url_for_call = url.clone();
            let attempt = self
                .core
                .circuit_breaker()
                .call(|| async move { fetcher.fetch_text(&url_for_call).await })
                .await;

            let html = match attempt {
                Ok(html) => html,
                Err(CircuitError::Rejected(fetch_error)) if fetch_error.is_blocked() => {
                    self.core.stats().record_error();
                    if let Some(compliance) = &self.compliance {
                        if let Err(report_error) = compliance.report_block(SOURCE_NAME).await {
                            warn!(source = SOURCE_NAME, %report_error, "failed to report block");
                        }
                    }
                    return Err(AdapterError::Transport {
                        source: SOURCE_NAME.to_owned(),
                        message: fetch_error.to_string(),
                    });
                }
                Err(error) => {
                    self.core.stats().record_error();
                    return Err(circuit_error_to_adapter_error(SOURCE_NAME, error));
                }
            };

            let listings = Self::parse_listing_page(&html);
            if listings.is_empty() {
                break;
            }
            self.core.stats().record_fetched(listings.len() as u64);

            let page_count = listings.len();
            for raw in listings {
                if let Some(job) = self.normalize_job(raw) {
                    results.push(job);
                }
            }

            if page_count < PAGE_SIZE {
                break;
            }
            if page < MAX_PAGES {
                sleep(RATE_LIMIT).await;
            }
        }

        if let Some(compliance) = &self.compliance {
            if let Err(reset_error) = compliance.reset_blocks(SOURCE_NAME).await {
                warn!(source = SOURCE_NAME, %reset_error, "failed to reset block counter");
            }
        }

        info!(source = SOURCE_NAME, count = results.len(), "fetch complete");
        Ok(results)
    }

    fn stats_snapshot(&self, clock: &dyn Clock) -> AdapterStatsSnapshot {
        AdapterStatsSnapshot {
            total_fetched: self.core.stats().total_fetched(),
            errors: self.core.stats().errors(),
            sampled_at: clock.utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockable::DefaultClock;
    use rstest::rstest;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::compliance::ComplianceReporter;
    use crate::domain::ports::ComplianceRepositoryError;
    use crate::outbound::http::RetryPolicy;

    #[derive(Default)]
    struct RecordingReporter {
        blocks: AtomicUsize,
        resets: AtomicUsize,
    }

    #[async_trait]
    impl ComplianceReporter for RecordingReporter {
        async fn report_block(&self, _source_key: &str) -> Result<(), ComplianceRepositoryError> {
            self.blocks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reset_blocks(&self, _source_key: &str) -> Result<(), ComplianceRepositoryError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            backoff_factor: 0.01,
            max_retry_delay_seconds: 0.02,
            timeout: std::time::Duration::from_secs(5),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn reports_block_and_aborts_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_policy(fast_policy()).expect("client builds");
        let reporter = Arc::new(RecordingReporter::default());
        let mut adapter = FinancejobsAdapter::with_compliance_reporter(
            fetcher,
            Arc::new(DefaultClock),
            reporter.clone(),
        );
        adapter.base_url = server.uri();

        let error = adapter
            .fetch_jobs("", "")
            .await
            .expect_err("429 aborts the fetch");
        assert!(matches!(error, AdapterError::Transport { .. }));
        assert_eq!(reporter.blocks.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.resets.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    fn parse_listing_page_extracts_jobs_from_next_data() {
        let html = r#"<html><body><script id="__NEXT_DATA__">
            {"props":{"initialProps":{"pageProps":{"jobsSSR":{"jobs":[
                {"jobId":"123","title":"Finance Analyst","companyName":"Acme SA","location":"Geneva"}
            ]}}}}}
        </script></body></html>"#;
        let listings = FinancejobsAdapter::parse_listing_page(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(
            listings.first().map(|listing| listing.title.as_str()),
            Some("Finance Analyst")
        );
    }

    #[rstest]
    fn parse_listing_page_returns_empty_when_script_missing() {
        let listings = FinancejobsAdapter::parse_listing_page("<html><body></body></html>");
        assert!(listings.is_empty());
    }
}
