//! Fuzzy hash computation for cross-source duplicate detection.
//!
//! Grounded on `examples/original_source/backend/services/deduplicator.py`:
//! the same `COMPANY_SUFFIXES`/`SENIORITY_STRIP` constant sets, the same
//! normalize-then-md5 recipe. The lookups themselves
//! (`find_fuzzy_duplicate`, semantic cosine search) live behind
//! [`crate::domain::ports::JobRepository`] since they require a database
//! round trip; this module only computes the hash that feeds them.

use std::sync::LazyLock;

use regex::Regex;

/// Legal company suffixes stripped before fuzzy-hashing a company name.
const COMPANY_SUFFIXES: &[&str] = &[
    "ag", "gmbh", "sa", "sarl", "sàrl", "ltd", "inc", "corp", "se", "plc", "srl", "co", "llc",
    "pty", "bv", "nv",
];

/// Seniority words and gender markers stripped before fuzzy-hashing a title.
/// Longer markers are listed before their substrings so replacement order
/// does not leave fragments behind.
const SENIORITY_STRIP: &[&str] = &[
    "(all genders)",
    "(m/f/d)",
    "(m/w/d)",
    "(f/m/d)",
    "(w/m/d)",
    "(m/f/x)",
    "(w/m/x)",
    "m/f/d",
    "m/w/d",
    "f/m/d",
    "w/m/d",
    "senior",
    "junior",
    "lead",
    "head",
    "intern",
    "trainee",
    "sr.",
    "jr.",
    "sr",
    "jr",
];

static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
    Regex::new(r"[^\w\s]").unwrap()
});
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
    Regex::new(r"\s+").unwrap()
});

fn normalize_title(title: &str) -> String {
    let mut normalized = title.to_lowercase();
    for word in SENIORITY_STRIP {
        normalized = normalized.replace(word, " ");
    }
    let normalized = PUNCT_RE.replace_all(&normalized, " ");
    SPACES_RE.replace_all(&normalized, " ").trim().to_owned()
}

fn normalize_company(company: &str) -> String {
    let lowered = company.to_lowercase();
    let no_punct = PUNCT_RE.replace_all(&lowered, " ");
    let kept: Vec<&str> = no_punct
        .split_whitespace()
        .filter(|word| !COMPANY_SUFFIXES.contains(word))
        .collect();
    SPACES_RE.replace_all(&kept.join(" "), " ").trim().to_owned()
}

/// Compute `md5(norm_title | norm_company)`, stable across seniority words,
/// gender markers, punctuation, and legal company suffixes.
#[must_use]
pub fn compute_fuzzy_hash(title: &str, company: &str) -> String {
    let raw = format!("{}|{}", normalize_title(title), normalize_company(company));
    format!("{:x}", md5::compute(raw.as_bytes()))
}

/// Compute the exact-match primary key: `md5(lower(title)|lower(company)|url)`.
#[must_use]
pub fn compute_exact_hash(title: &str, company: &str, url: &str) -> String {
    let raw = format!("{}|{}|{}", title.to_lowercase(), company.to_lowercase(), url);
    format!("{:x}", md5::compute(raw.as_bytes()))
}

/// Cosine-similarity threshold above which two embeddings are considered a
/// semantic duplicate.
pub const SEMANTIC_SIMILARITY_THRESHOLD: f32 = 0.95;

/// Cosine distance corresponding to [`SEMANTIC_SIMILARITY_THRESHOLD`]:
/// `distance < max_distance` is a hit.
#[must_use]
pub fn semantic_max_distance() -> f32 {
    1.0 - SEMANTIC_SIMILARITY_THRESHOLD
}
