//! Core domain records: the canonical [`Job`] and per-source [`SourceCompliance`].
//!
//! These structs are intentionally independent of their Diesel row
//! representations in [`crate::outbound::persistence::schema`]; conversions
//! live in the outbound adapters, mirroring the teacher's
//! `OsmIngestionProvenanceRecord` / `OsmIngestionProvenanceRow` split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Salary cadence as reported by the source before annualisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryPeriod {
    /// Per-year figure.
    Yearly,
    /// Per-month figure.
    Monthly,
    /// Per-hour figure.
    Hourly,
}

impl SalaryPeriod {
    /// Stable lowercase identifier, used by persistence layers that store
    /// this enum as a plain text column rather than a SQL enum type.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Hourly => "hourly",
        }
    }

    /// Parse the identifier produced by [`Self::as_db_str`].
    #[must_use]
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "yearly" => Some(Self::Yearly),
            "monthly" => Some(Self::Monthly),
            "hourly" => Some(Self::Hourly),
            _ => None,
        }
    }
}

/// Detected posting language, restricted to Swiss national languages plus English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// German.
    De,
    /// French.
    Fr,
    /// English.
    En,
    /// Italian.
    It,
}

impl Language {
    /// Stable lowercase identifier, used by persistence layers that store
    /// this enum as a plain text column rather than a SQL enum type.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::De => "de",
            Self::Fr => "fr",
            Self::En => "en",
            Self::It => "it",
        }
    }

    /// Parse the identifier produced by [`Self::as_db_str`].
    #[must_use]
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "de" => Some(Self::De),
            "fr" => Some(Self::Fr),
            "en" => Some(Self::En),
            "it" => Some(Self::It),
            _ => None,
        }
    }
}

/// Inferred seniority level, ordered from least to most senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    /// Intern / working student.
    Intern,
    /// Junior.
    Junior,
    /// Mid-level, individual contributor.
    Mid,
    /// Senior individual contributor.
    Senior,
    /// Team or tech lead.
    Lead,
    /// Head of a function.
    Head,
    /// Director level.
    Director,
}

impl Seniority {
    /// Stable lowercase identifier, used by persistence layers that store
    /// this enum as a plain text column rather than a SQL enum type.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Intern => "intern",
            Self::Junior => "junior",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Lead => "lead",
            Self::Head => "head",
            Self::Director => "director",
        }
    }

    /// Parse the identifier produced by [`Self::as_db_str`].
    #[must_use]
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "intern" => Some(Self::Intern),
            "junior" => Some(Self::Junior),
            "mid" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" => Some(Self::Lead),
            "head" => Some(Self::Head),
            "director" => Some(Self::Director),
            _ => None,
        }
    }
}

/// Inferred contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    /// Permanent, full-time role.
    FullTime,
    /// Permanent, part-time role.
    PartTime,
    /// Fixed-term contracting engagement.
    Contract,
    /// Internship.
    Internship,
    /// Apprenticeship.
    Apprenticeship,
    /// Fixed-term temporary role.
    Temporary,
}

impl ContractType {
    /// Stable lowercase identifier, used by persistence layers that store
    /// this enum as a plain text column rather than a SQL enum type.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Contract => "contract",
            Self::Internship => "internship",
            Self::Apprenticeship => "apprenticeship",
            Self::Temporary => "temporary",
        }
    }

    /// Parse the identifier produced by [`Self::as_db_str`].
    #[must_use]
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "full_time" => Some(Self::FullTime),
            "part_time" => Some(Self::PartTime),
            "contract" => Some(Self::Contract),
            "internship" => Some(Self::Internship),
            "apprenticeship" => Some(Self::Apprenticeship),
            "temporary" => Some(Self::Temporary),
            _ => None,
        }
    }
}

/// Two-letter Swiss canton code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canton(pub [u8; 2]);

impl Canton {
    /// Build a canton code from an ASCII-uppercase two-letter string.
    #[must_use]
    pub fn new(code: [u8; 2]) -> Self {
        Self(code)
    }

    /// The two-letter code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Canton codes are always constructed from ASCII-uppercase letters
        // in `domain::normalizer::extract_canton`.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// Build a canton code from a two-character string, as read back from
    /// persistence. Returns `None` if `code` is not exactly two bytes.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let bytes = code.as_bytes();
        <[u8; 2]>::try_from(bytes).ok().map(Self::new)
    }
}

/// The canonical aggregated job posting record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 32-hex exact-match identity, `md5(lower(title)|lower(company)|url)`.
    pub hash: String,
    /// Adapter identifier that produced this sighting.
    pub source: String,
    pub title: String,
    pub company: String,
    /// Canonical posting URL; unique across all jobs.
    pub url: String,
    pub location: String,
    pub canton: Option<Canton>,
    pub description: String,
    /// Truncated to 200 characters.
    pub description_snippet: String,
    pub salary_min_chf: Option<f64>,
    pub salary_max_chf: Option<f64>,
    pub salary_original: Option<String>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<SalaryPeriod>,
    pub language: Option<Language>,
    pub seniority: Option<Seniority>,
    pub contract_type: Option<ContractType>,
    pub remote: bool,
    /// At most 15 entries.
    pub tags: Vec<String>,
    pub logo: Option<String>,
    pub employment_type: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    /// `md5(norm_title|norm_company)`, stable across seniority/gender noise.
    pub fuzzy_hash: String,
    /// Hash of the canonical row this one was deduplicated against.
    pub duplicate_of: Option<String>,
    /// 384-dimensional normalized embedding, populated by a downstream task.
    pub embedding: Option<Vec<f32>>,
}

impl Job {
    /// Cap `tags` at 15 entries, matching the §3 invariant.
    pub fn cap_tags(&mut self) {
        const MAX_TAGS: usize = 15;
        if self.tags.len() > MAX_TAGS {
            self.tags.truncate(MAX_TAGS);
        }
    }

    /// Truncate `description` into `description_snippet`, capped at 200 chars.
    pub fn refresh_snippet(&mut self) {
        const MAX_SNIPPET_CHARS: usize = 200;
        self.description_snippet = self.description.chars().take(MAX_SNIPPET_CHARS).collect();
    }
}

/// Fetch method used by a source, constraining what compliance checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceMethod {
    /// A documented, permission-granted API.
    Api,
    /// HTML scraping subject to robots.txt / ToS review.
    Scraping,
}

impl ComplianceMethod {
    /// Stable lowercase identifier, used by persistence layers that store
    /// this enum as a plain text column rather than a SQL enum type.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Scraping => "scraping",
        }
    }

    /// Parse the identifier produced by [`Self::as_db_str`].
    #[must_use]
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "api" => Some(Self::Api),
            "scraping" => Some(Self::Scraping),
            _ => None,
        }
    }
}

/// Compliance posture for a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCompliance {
    /// Unique, lowercase source identifier; matches an adapter's `source_name`.
    pub source_key: String,
    pub method: ComplianceMethod,
    pub is_allowed: bool,
    pub robots_txt_ok: bool,
    pub rate_limit_seconds: f64,
    pub max_requests_per_hour: Option<u32>,
    pub auto_disable_on_block: bool,
    pub consecutive_blocks: u32,
    pub last_blocked_at: Option<DateTime<Utc>>,
    pub tos_notes: Option<String>,
}
