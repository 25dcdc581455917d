//! Internal Diesel row structs for the `jobs` and `source_compliance` tables.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions to/from [`crate::domain::model`]
//! live in [`super::diesel_job_repository`] and
//! [`super::diesel_compliance_repository`].

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

use super::schema::{jobs, source_compliance};

/// Row struct for reading from the `jobs` table.
///
/// Also derives `QueryableByName` so [`super::diesel_job_repository`] can map
/// the raw `sql_query` result of its pgvector `<=>` semantic-neighbour
/// lookup directly onto this struct.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct JobRow {
    pub hash: String,
    pub source: String,
    pub title: String,
    pub company: String,
    pub url: String,
    pub location: String,
    pub canton: Option<String>,
    pub description: String,
    pub description_snippet: String,
    pub salary_min_chf: Option<f64>,
    pub salary_max_chf: Option<f64>,
    pub salary_original: Option<String>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub language: Option<String>,
    pub seniority: Option<String>,
    pub contract_type: Option<String>,
    pub remote: bool,
    pub tags: Vec<String>,
    pub logo: Option<String>,
    pub employment_type: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    pub fuzzy_hash: String,
    pub duplicate_of: Option<String>,
    pub embedding: Option<Vector>,
    pub consecutive_unreachable: i32,
}

/// Insertable row for a fresh `jobs` sighting.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub(crate) struct NewJobRow<'a> {
    pub hash: &'a str,
    pub source: &'a str,
    pub title: &'a str,
    pub company: &'a str,
    pub url: &'a str,
    pub location: &'a str,
    pub canton: Option<&'a str>,
    pub description: &'a str,
    pub description_snippet: &'a str,
    pub salary_min_chf: Option<f64>,
    pub salary_max_chf: Option<f64>,
    pub salary_original: Option<&'a str>,
    pub salary_currency: Option<&'a str>,
    pub salary_period: Option<&'a str>,
    pub language: Option<&'a str>,
    pub seniority: Option<&'a str>,
    pub contract_type: Option<&'a str>,
    pub remote: bool,
    pub tags: &'a [String],
    pub logo: Option<&'a str>,
    pub employment_type: Option<&'a str>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    pub fuzzy_hash: &'a str,
    pub duplicate_of: Option<&'a str>,
}

/// Row struct for reading from the `source_compliance` table.
///
/// Also derives `QueryableByName` so [`super::diesel_compliance_repository`]
/// can map the `RETURNING` clause of its atomic `report_block` raw SQL
/// statement directly onto this struct.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = source_compliance)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SourceComplianceRow {
    pub source_key: String,
    pub method: String,
    pub is_allowed: bool,
    pub robots_txt_ok: bool,
    pub rate_limit_seconds: f64,
    pub max_requests_per_hour: Option<i32>,
    pub auto_disable_on_block: bool,
    pub consecutive_blocks: i32,
    pub last_blocked_at: Option<DateTime<Utc>>,
    pub tos_notes: Option<String>,
}
