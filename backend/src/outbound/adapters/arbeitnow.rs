//! Arbeitnow job board API provider.
//!
//! Grounded on `examples/original_source/backend/providers/arbeitnow.py`:
//! up to 3 pages, stops early on an empty page, merges API-supplied tags
//! with extracted skill tags.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::Method;
use serde::Deserialize;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::domain::adapter::{
    circuit_error_to_adapter_error, AdapterCore, AdapterError, AdapterStatsSnapshot, SourceAdapter,
};
use crate::domain::deduplicator::compute_exact_hash;
use crate::domain::model::Job;
use crate::domain::normalizer::{extract_canton, extract_job_skills, strip_html_tags};
use crate::outbound::http::HttpFetcher;

const SOURCE_NAME: &str = "arbeitnow";
const API_URL: &str = "https://www.arbeitnow.com/api/job-board-api";
const MAX_PAGES: u32 = 3;
const PAGE_DELAY: Duration = Duration::from_millis(500);
const MAX_TAGS: usize = 15;

#[derive(Debug, Deserialize)]
struct ArbeitnowResponse {
    #[serde(default)]
    data: Vec<ArbeitnowJob>,
}

#[derive(Debug, Deserialize)]
struct ArbeitnowJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    remote: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    job_types: Vec<String>,
}

/// JSON API provider adapter for arbeitnow.com.
pub struct ArbeitnowAdapter {
    core: AdapterCore,
    fetcher: HttpFetcher,
    clock: Arc<dyn Clock>,
}

impl ArbeitnowAdapter {
    /// Build the adapter over a shared [`HttpFetcher`] and clock.
    #[must_use]
    pub fn new(fetcher: HttpFetcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            core: AdapterCore::new(SOURCE_NAME, clock.clone()),
            fetcher,
            clock,
        }
    }

    fn normalize_job(&self, raw: ArbeitnowJob) -> Option<Job> {
        let title = raw.title.trim().to_owned();
        let company = raw.company_name.trim().to_owned();
        let url = raw.url.trim().to_owned();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        let description = strip_html_tags(&raw.description);
        let extracted_tags = extract_job_skills(&title, &description);

        let mut merged_tags = Vec::new();
        let mut seen_lower = std::collections::HashSet::new();
        for tag in raw.tags.into_iter().chain(extracted_tags) {
            let trimmed = tag.trim().to_owned();
            if trimmed.is_empty() {
                continue;
            }
            let lower = trimmed.to_lowercase();
            if seen_lower.insert(lower) {
                merged_tags.push(trimmed);
            }
        }
        merged_tags.truncate(MAX_TAGS);

        let employment_type = if raw.job_types.is_empty() {
            None
        } else {
            Some(raw.job_types.join(", "))
        };

        let description_snippet: String = description.chars().take(200).collect();
        let now = self.clock.utc();

        Some(Job {
            hash: compute_exact_hash(&title, &company, &url),
            source: SOURCE_NAME.to_owned(),
            title,
            company,
            url,
            canton: extract_canton(&raw.location),
            location: raw.location,
            description,
            description_snippet,
            salary_min_chf: None,
            salary_max_chf: None,
            salary_original: None,
            salary_currency: None,
            salary_period: None,
            language: None,
            seniority: None,
            contract_type: None,
            remote: raw.remote,
            tags: merged_tags,
            logo: None,
            employment_type,
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
impl SourceAdapter for ArbeitnowAdapter {
    fn source_name(&self) -> &str {
        self.core.source_name()
    }

    async fn fetch_jobs(&self, _query: &str, _location: &str) -> Result<Vec<Job>, AdapterError> {
        let mut results = Vec::new();

        for page in 1..=MAX_PAGES {
            let fetcher = &self.fetcher;
            let page_str = page.to_string();
            let attempt = self
                .core
                .circuit_breaker()
                .call(|| async move {
                    fetcher
                        .fetch_json::<()>(Method::GET, API_URL, &[("page", page_str.as_str())], None)
                        .await
                })
                .await;

            let body = match attempt {
                Ok(body) => body,
                Err(error) => {
                    self.core.stats().record_error();
                    return Err(circuit_error_to_adapter_error(SOURCE_NAME, error));
                }
            };

            let parsed: ArbeitnowResponse = match serde_json::from_value(body) {
                Ok(parsed) => parsed,
                Err(error) => {
                    self.core.stats().record_error();
                    warn!(source = SOURCE_NAME, %error, "failed to decode page");
                    break;
                }
            };

            if parsed.data.is_empty() {
                break;
            }

            self.core.stats().record_fetched(parsed.data.len() as u64);
            for raw in parsed.data {
                if let Some(job) = self.normalize_job(raw) {
                    results.push(job);
                }
            }

            if page < MAX_PAGES {
                sleep(PAGE_DELAY).await;
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
