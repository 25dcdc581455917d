//! Pure enrichment passes chained over a [`Job`] before it reaches the
//! deduplicator.
//!
//! Grounded on `examples/original_source/backend/services/data_normalizer.py`
//! (salary tables, seniority/contract keyword lists) and
//! `examples/original_source/backend/utils/text.py` (`strip_html_tags`,
//! Swiss canton table, tech-tag list). Every pass is idempotent and never
//! overwrites a field the adapter already populated.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::model::{ContractType, Job, Language, Seniority};

const CURRENCY_EUR_TO_CHF: f64 = 0.96;
const CURRENCY_USD_TO_CHF: f64 = 0.88;
const CURRENCY_GBP_TO_CHF: f64 = 1.12;
const CURRENCY_CHF_TO_CHF: f64 = 1.0;

const PERIOD_MULTIPLIER_MONTHLY: f64 = 12.0;
const PERIOD_MULTIPLIER_HOURLY: f64 = 2080.0;

/// Apply every normalization pass, in the fixed order the ingestion core
/// relies on: salary, language, seniority, contract type.
pub fn normalize(job: &mut Job) {
    normalize_salary(job);
    detect_language(job);
    infer_seniority(job);
    infer_contract_type(job);
}

fn currency_rate(currency: &str) -> f64 {
    match currency.to_ascii_uppercase().as_str() {
        "EUR" => CURRENCY_EUR_TO_CHF,
        "USD" => CURRENCY_USD_TO_CHF,
        "GBP" => CURRENCY_GBP_TO_CHF,
        _ => CURRENCY_CHF_TO_CHF,
    }
}

fn period_multiplier(period: crate::domain::model::SalaryPeriod) -> f64 {
    use crate::domain::model::SalaryPeriod::{Hourly, Monthly, Yearly};
    match period {
        Yearly => 1.0,
        Monthly => PERIOD_MULTIPLIER_MONTHLY,
        Hourly => PERIOD_MULTIPLIER_HOURLY,
    }
}

static SALARY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(
        clippy::unwrap_used,
        reason = "pattern is a fixed literal checked at compile time in tests"
    )]
    Regex::new(r"(?i)(\d[\d.,]*)\s*k?\s*(?:-|–|—|to)+\s*(\d[\d.,]*)\s*k?").unwrap()
});

static SALARY_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
    Regex::new(r"(\d[\d.,]+)\s*[kK]?").unwrap()
});

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
    Regex::new(r"(?i)\b(CHF|EUR|USD|GBP)\b|[€$£]").unwrap()
});

fn currency_symbol_to_code(raw: &str) -> String {
    match raw {
        "€" => "EUR".to_owned(),
        "$" => "USD".to_owned(),
        "£" => "GBP".to_owned(),
        other => other.to_ascii_uppercase(),
    }
}

/// Parse a bare number, handling thousand separators and a trailing "k"
/// (values under 1000 followed by "k" are scaled ×1000).
fn parse_number(raw: &str, had_k_suffix: bool) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let mut value: f64 = cleaned.parse().ok()?;
    if had_k_suffix && value < 1000.0 {
        value *= 1000.0;
    }
    Some(value)
}

fn parse_salary_string(text: &str) -> (Option<f64>, Option<f64>, Option<String>) {
    let currency = CURRENCY_RE
        .captures(text)
        .map(|caps| caps.get(1).map_or_else(|| caps[0].to_owned(), |m| m.as_str().to_owned()))
        .map(|raw| currency_symbol_to_code(&raw));

    if let Some(caps) = SALARY_RANGE_RE.captures(text) {
        let had_k = text.to_ascii_lowercase().contains('k');
        let lo = caps.get(1).and_then(|m| parse_number(m.as_str(), had_k));
        let hi = caps.get(2).and_then(|m| parse_number(m.as_str(), had_k));
        return (lo, hi, currency);
    }

    if let Some(caps) = SALARY_SINGLE_RE.captures(text) {
        let had_k = text.to_ascii_lowercase().contains('k');
        #[expect(
            clippy::indexing_slicing,
            reason = "capture group 1 always exists when the whole match does"
        )]
        let value = parse_number(&caps[1], had_k);
        return (value, value, currency);
    }

    (None, None, currency)
}

/// Convert `salary_original` into annualized CHF figures, unless both are
/// already populated.
pub fn normalize_salary(job: &mut Job) {
    if job.salary_min_chf.is_some() && job.salary_max_chf.is_some() {
        return;
    }

    let mut sal_min = job.salary_min_chf;
    let mut sal_max = job.salary_max_chf;
    let mut currency = job.salary_currency.clone();

    if let Some(original) = job.salary_original.as_deref().filter(|s| !s.is_empty()) {
        if sal_min.is_none() && sal_max.is_none() {
            let (lo, hi, parsed_currency) = parse_salary_string(original);
            sal_min = lo;
            sal_max = hi;
            if currency.is_none() {
                currency = parsed_currency;
            }
        }
    }

    if sal_min.is_none() && sal_max.is_none() {
        return;
    }

    let rate = currency.as_deref().map_or(1.0, currency_rate);
    let multiplier = job.salary_period.map_or(1.0, period_multiplier);

    if let Some(min) = sal_min {
        job.salary_min_chf = Some((min * rate * multiplier).trunc());
    }
    if let Some(max) = sal_max {
        job.salary_max_chf = Some((max * rate * multiplier).trunc());
    }
    if job.salary_currency.is_none() {
        job.salary_currency = currency;
    }
}

const LANGUAGE_MIN_TEXT_LEN: usize = 50;
const LANGUAGE_MIN_CONFIDENCE: f64 = 0.7;

/// Stopwords used as a lightweight, dependency-free language signal: the
/// language whose stopwords appear most densely in the combined
/// title+description wins, if its share of matched tokens clears the
/// confidence floor.
const DE_STOPWORDS: &[&str] = &[
    "und", "der", "die", "das", "mit", "für", "ein", "eine", "wir", "sie", "ist", "von", "zu",
    "nicht", "auf", "im",
];
const FR_STOPWORDS: &[&str] = &[
    "le", "la", "les", "des", "et", "pour", "avec", "vous", "nous", "est", "une", "dans", "qui",
    "votre", "notre",
];
const IT_STOPWORDS: &[&str] = &[
    "il", "la", "di", "che", "per", "con", "non", "una", "gli", "sono", "del", "alla", "nostro",
];
const EN_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "you", "our", "are", "this", "that", "will", "your", "from",
    "team",
];

fn stopword_matches(tokens: &[&str], stopwords: &[&str]) -> usize {
    tokens.iter().filter(|t| stopwords.contains(t)).count()
}

/// Detect `title + description` language, restricted to {de, fr, en, it}.
///
/// A dependency-free stand-in for the original's statistical language
/// detector. Each candidate language's score is its stopword hit count;
/// confidence is the winning language's share of the hits found *across all
/// candidate languages* (not a share of total tokens — prose is mostly
/// non-stopwords, so that denominator never clears a useful floor). A clear
/// passage in one language racks up hits against that language's list and
/// only stray overlap against the others, so the winner's share of total
/// hits climbs close to 1.0; accepted only when the text clears 50
/// characters and that share clears 0.7.
pub fn detect_language(job: &mut Job) {
    if job.language.is_some() {
        return;
    }

    let combined = format!("{} {}", job.title, job.description);
    let trimmed = combined.trim();
    if trimmed.chars().count() < LANGUAGE_MIN_TEXT_LEN {
        return;
    }

    let lowered = trimmed.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let scores = [
        (Language::De, stopword_matches(&tokens, DE_STOPWORDS)),
        (Language::Fr, stopword_matches(&tokens, FR_STOPWORDS)),
        (Language::It, stopword_matches(&tokens, IT_STOPWORDS)),
        (Language::En, stopword_matches(&tokens, EN_STOPWORDS)),
    ];

    let total_hits: usize = scores.iter().map(|(_, hits)| hits).sum();
    if total_hits == 0 {
        return;
    }

    let Some((language, hits)) = scores.into_iter().max_by_key(|(_, hits)| *hits) else {
        return;
    };
    #[expect(clippy::cast_precision_loss, reason = "token counts are small")]
    let confidence = hits as f64 / total_hits as f64;
    if confidence >= LANGUAGE_MIN_CONFIDENCE {
        job.language = Some(language);
    }
}

/// Priority-ordered (most senior first) multilingual keyword lists.
const SENIORITY_PATTERNS: &[(Seniority, &[&str])] = &[
    (
        Seniority::Head,
        &["head of", "director", "directeur", "direktor", "chef de"],
    ),
    (
        Seniority::Lead,
        &["lead", "leiter", "team lead", "chef d'équipe", "teamleiter"],
    ),
    (
        Seniority::Senior,
        &["senior", "sr.", "experienced", "erfahren", "expérimenté"],
    ),
    (Seniority::Mid, &["mid-level", "mid level", "confirmé", "confirmed"]),
    (Seniority::Junior, &["junior", "jr.", "anfänger", "débutant"]),
    (
        Seniority::Intern,
        &[
            "intern",
            "internship",
            "praktikant",
            "praktikum",
            "stage",
            "stagiaire",
            "trainee",
        ],
    ),
];

/// Infer seniority from the lowercased title, first keyword match wins.
pub fn infer_seniority(job: &mut Job) {
    if job.seniority.is_some() {
        return;
    }
    let title_lower = job.title.to_lowercase();
    if title_lower.is_empty() {
        return;
    }
    for (level, keywords) in SENIORITY_PATTERNS {
        if keywords.iter().any(|keyword| title_lower.contains(keyword)) {
            job.seniority = Some(*level);
            return;
        }
    }
}

const CONTRACT_PATTERNS: &[(ContractType, &[&str])] = &[
    (
        ContractType::Apprenticeship,
        &["apprenticeship", "apprentissage", "lehre", "lehrstelle", "lehrling"],
    ),
    (
        ContractType::Internship,
        &["internship", "praktikum", "stage", "stagiaire", "trainee"],
    ),
    (
        ContractType::Temporary,
        &["temporary", "temp ", "temporär", "intérim", "interim"],
    ),
    (
        ContractType::Contract,
        &["contract", "freelance", "befristet", "cdd", "contrat à durée déterminée"],
    ),
    (
        ContractType::PartTime,
        &[
            "part-time", "part time", "teilzeit", "temps partiel", "50%", "60%", "70%", "80%",
            "90%",
        ],
    ),
    (
        ContractType::FullTime,
        &[
            "full-time", "full time", "100%", "vollzeit", "temps plein", "festanstellung",
            "unbefristet", "cdi", "permanent",
        ],
    ),
];

/// Infer contract type from the first non-empty of `employment_type`,
/// `title`, `description_snippet` — the three fields are checked in that
/// priority order and only the first non-empty one is scanned for keywords.
pub fn infer_contract_type(job: &mut Job) {
    if job.contract_type.is_some() {
        return;
    }

    let candidate = [
        job.employment_type.as_deref(),
        Some(job.title.as_str()),
        Some(job.description_snippet.as_str()),
    ]
    .into_iter()
    .flatten()
    .find(|text| !text.trim().is_empty());

    let Some(text) = candidate else {
        return;
    };
    let lowered = text.to_lowercase();

    for (contract_type, keywords) in CONTRACT_PATTERNS {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            job.contract_type = Some(*contract_type);
            return;
        }
    }
}

/// Strip HTML tags and collapse whitespace, matching the original's
/// `strip_html_tags`.
#[must_use]
pub fn strip_html_tags(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
        Regex::new(r"<[^>]+>").unwrap()
    });
    static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
        #[expect(clippy::unwrap_used, reason = "pattern is a fixed literal")]
        Regex::new(r"\s+").unwrap()
    });
    let no_tags = TAG_RE.replace_all(text, " ");
    SPACE_RE.replace_all(&no_tags, " ").trim().to_owned()
}

/// Swiss canton name variants (DE/FR/IT/EN, lowercase) mapped to their
/// 2-letter code.
const SWISS_CANTONS: &[(&str, [u8; 2])] = &[
    ("zurich", *b"ZH"),
    ("zürich", *b"ZH"),
    ("bern", *b"BE"),
    ("berne", *b"BE"),
    ("luzern", *b"LU"),
    ("lucerne", *b"LU"),
    ("uri", *b"UR"),
    ("schwyz", *b"SZ"),
    ("obwalden", *b"OW"),
    ("nidwalden", *b"NW"),
    ("glarus", *b"GL"),
    ("zug", *b"ZG"),
    ("fribourg", *b"FR"),
    ("freiburg", *b"FR"),
    ("solothurn", *b"SO"),
    ("basel-stadt", *b"BS"),
    ("basel", *b"BS"),
    ("bâle", *b"BS"),
    ("basel-landschaft", *b"BL"),
    ("schaffhausen", *b"SH"),
    ("appenzell ausserrhoden", *b"AR"),
    ("appenzell innerrhoden", *b"AI"),
    ("st. gallen", *b"SG"),
    ("st.gallen", *b"SG"),
    ("saint-gall", *b"SG"),
    ("graubünden", *b"GR"),
    ("graubunden", *b"GR"),
    ("grisons", *b"GR"),
    ("aargau", *b"AG"),
    ("argovie", *b"AG"),
    ("thurgau", *b"TG"),
    ("thurgovie", *b"TG"),
    ("ticino", *b"TI"),
    ("tessin", *b"TI"),
    ("vaud", *b"VD"),
    ("waadt", *b"VD"),
    ("valais", *b"VS"),
    ("wallis", *b"VS"),
    ("neuchâtel", *b"NE"),
    ("neuchatel", *b"NE"),
    ("neuenburg", *b"NE"),
    ("genève", *b"GE"),
    ("geneve", *b"GE"),
    ("geneva", *b"GE"),
    ("genf", *b"GE"),
    ("jura", *b"JU"),
];

/// Try to recognize a Swiss canton from a free-text location string.
///
/// Direct match on the whole (trimmed, lowercased) string first; otherwise a
/// substring match against names longer than two characters, to avoid
/// two-letter codes false-positiving against unrelated text.
#[must_use]
pub fn extract_canton(location: &str) -> Option<crate::domain::model::Canton> {
    let loc_lower = location.to_lowercase();
    let loc_lower = loc_lower.trim();
    if loc_lower.is_empty() {
        return None;
    }

    if let Some((_, code)) = SWISS_CANTONS.iter().find(|(name, _)| *name == loc_lower) {
        return Some(crate::domain::model::Canton::new(*code));
    }

    SWISS_CANTONS
        .iter()
        .find(|(name, _)| name.len() > 2 && loc_lower.contains(name))
        .map(|(_, code)| crate::domain::model::Canton::new(*code))
}

/// Case-insensitive technology/skill tags recognized in title+description.
const TECH_TAGS: &[&str] = &[
    "python", "javascript", "typescript", "java", "php", "ruby", "go", "rust", "c++", "c#",
    "swift", "kotlin", "scala", "react", "angular", "vue.js", "next.js", "svelte", "tailwindcss",
    "node.js", "django", "flask", "fastapi", "spring", "laravel", "express", "rails", "asp.net",
    ".net", "machine learning", "data science", "deep learning", "nlp", "tensorflow", "pytorch",
    "pandas", "spark", "sql", "postgresql", "mysql", "mongodb", "redis", "elasticsearch",
    "oracle", "sqlite", "docker", "kubernetes", "aws", "azure", "gcp", "terraform", "ansible",
    "ci/cd", "jenkins", "github actions", "git", "linux", "jira", "figma", "graphql", "rest api",
    "devops", "sre", "qa", "cybersecurity", "blockchain", "product manager", "scrum master",
];

/// Extract at most 15 unique skill tags mentioned in `title`/`description`.
#[must_use]
pub fn extract_job_skills(title: &str, description: &str) -> Vec<String> {
    let combined = format!("{title} {description}").to_lowercase();
    let mut found = Vec::new();
    for tag in TECH_TAGS {
        if combined.contains(tag) {
            found.push((*tag).to_owned());
        }
        if found.len() >= 15 {
            break;
        }
    }
    found
}
