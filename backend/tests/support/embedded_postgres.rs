//! Shared embedded PostgreSQL helpers for integration tests.
//!
//! These helpers keep embedded PostgreSQL setup consistent across integration
//! test suites:
//!
//! - Database reset and creation use `postgres` to avoid Diesel transaction
//!   semantics interfering with `DROP DATABASE`.
//! - Schema setup runs embedded Diesel migrations so test schemas do not drift.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use uuid::Uuid;

use super::format_postgres_error;

/// Embedded migrations from the backend/migrations directory.
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn validate_pg_identifier(name: &str) -> Result<(), String> {
    let is_valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');

    if is_valid {
        Ok(())
    } else {
        Err(format!("invalid database identifier: {name}"))
    }
}

/// Drops and recreates a database within the embedded cluster.
pub fn reset_database(cluster: &TestCluster, db_name: &str) -> Result<(), String> {
    validate_pg_identifier(db_name)?;

    let admin_url = cluster.connection().database_url("postgres");
    let mut client =
        Client::connect(&admin_url, NoTls).map_err(|err| format_postgres_error(&err))?;

    // `DROP DATABASE` requires that no active sessions exist for `db_name`.
    // This helper assumes tests drop any connections to the database before
    // attempting a reset.
    client
        .batch_execute(&format!("DROP DATABASE IF EXISTS \"{db_name}\";"))
        .map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute(&format!("CREATE DATABASE \"{db_name}\";"))
        .map_err(|err| format_postgres_error(&err))?;
    Ok(())
}

/// Runs all pending Diesel migrations against the test database.
pub fn migrate_schema(url: &str) -> Result<(), String> {
    let mut conn = PgConnection::establish(url).map_err(|err| format!("{err:?}"))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| format!("migration: {err:?}"))?;
    Ok(())
}

/// A database provisioned within the shared embedded cluster, with
/// migrations already applied. Each call to [`provision_template_database`]
/// creates a fresh, uniquely-named database so tests do not see each
/// other's rows.
pub struct ProvisionedDatabase {
    name: String,
    url: String,
}

impl ProvisionedDatabase {
    /// Connection URL for this provisioned database.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Name of the underlying database within the cluster.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Creates a fresh, uniquely-named database in `cluster` and applies all
/// pending migrations to it, matching the schema jobs/compliance tests run
/// against in production.
pub fn provision_template_database(cluster: &TestCluster) -> Result<ProvisionedDatabase, String> {
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    validate_pg_identifier(&db_name)?;

    let admin_url = cluster.connection().database_url("postgres");
    let mut client =
        Client::connect(&admin_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute(&format!("CREATE DATABASE \"{db_name}\";"))
        .map_err(|err| format_postgres_error(&err))?;

    let url = cluster.connection().database_url(&db_name);
    migrate_schema(&url)?;

    Ok(ProvisionedDatabase { name: db_name, url })
}
