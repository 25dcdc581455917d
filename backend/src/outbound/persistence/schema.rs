//! Diesel table definitions for the PostgreSQL schema.
//!
//! Maintained manually, matching the teacher's convention of hand-written
//! `table!` blocks kept in step with the `diesel_migrations` directory
//! rather than generated via `diesel print-schema`.

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::Vector;

    jobs (hash) {
        hash -> Text,
        source -> Text,
        title -> Text,
        company -> Text,
        url -> Text,
        location -> Text,
        canton -> Nullable<Bpchar>,
        description -> Text,
        description_snippet -> Text,
        salary_min_chf -> Nullable<Double>,
        salary_max_chf -> Nullable<Double>,
        salary_original -> Nullable<Text>,
        salary_currency -> Nullable<Text>,
        salary_period -> Nullable<Text>,
        language -> Nullable<Text>,
        seniority -> Nullable<Text>,
        contract_type -> Nullable<Text>,
        remote -> Bool,
        tags -> Array<Text>,
        logo -> Nullable<Text>,
        employment_type -> Nullable<Text>,
        first_seen_at -> Timestamptz,
        last_seen_at -> Timestamptz,
        is_active -> Bool,
        fuzzy_hash -> Text,
        duplicate_of -> Nullable<Text>,
        embedding -> Nullable<Vector>,
        consecutive_unreachable -> Int4,
    }
}

diesel::table! {
    source_compliance (source_key) {
        source_key -> Text,
        method -> Text,
        is_allowed -> Bool,
        robots_txt_ok -> Bool,
        rate_limit_seconds -> Double,
        max_requests_per_hour -> Nullable<Int4>,
        auto_disable_on_block -> Bool,
        consecutive_blocks -> Int4,
        last_blocked_at -> Nullable<Timestamptz>,
        tos_notes -> Nullable<Text>,
    }
}
