//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing the process-wide PostgreSQL connection pool
//! - Applying, reverting and inspecting schema migrations
//! - Checking that the expected tables exist

use sqlx::{
    ConnectOptions, Connection, PgConnection, Pool, Postgres,
    migrate::{Migrate, MigrateError, Migrator},
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{config::Config, error::AppError};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Migrations embedded from the `migrations/` directory at compile time.
///
/// Applied revisions are recorded in `_sqlx_migrations`, so running the
/// migrator again skips everything already applied.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Name of the revision-tracking table maintained by the migrator.
pub const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

/// Tables a fully migrated database must contain.
pub const REQUIRED_TABLES: [&str; 4] = ["users", "api_keys", "qr_codes", MIGRATIONS_TABLE];

/// Pool settings shared by the eager and lazy constructors.
///
/// - Maximum connections: `DATABASE_MAX_CONNECTIONS` (default 5)
/// - Acquire timeout: `DATABASE_ACQUIRE_TIMEOUT` seconds (default 30). While
///   opening a new connection inside `acquire`, sqlx retries retryable
///   connect errors with backoff until this runs out and then reports
///   `PoolTimedOut`. [`check_reachable`] is the single-attempt alternative.
/// - Every connection is pinged before being handed out, so a stale
///   connection is replaced instead of failing the request
/// - Statement logging only when `DEBUG` is on
fn pool_options(config: &Config) -> Result<(PgPoolOptions, PgConnectOptions), sqlx::Error> {
    let mut connect_options: PgConnectOptions = config.effective_database_url().parse()?;
    if !config.debug {
        connect_options = connect_options.disable_statement_logging();
    }

    let pool_options = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.acquire_timeout())
        .test_before_acquire(true);

    Ok((pool_options, connect_options))
}

/// Create the PostgreSQL connection pool and open its first connection.
///
/// Called once at startup; the pool is then shared for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    let (pool_options, connect_options) = pool_options(config)?;
    pool_options.connect_with(connect_options).await
}

/// Create the pool without connecting.
///
/// Connections are opened on first acquire, so this succeeds even when the
/// database is down.
pub fn create_lazy_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    let (pool_options, connect_options) = pool_options(config)?;
    Ok(pool_options.connect_lazy_with(connect_options))
}

/// Make one direct connection attempt with the pool's settings, then close it.
///
/// Nothing is retried: a refused connection comes back as the underlying
/// error (`sqlx::Error::Io`). The attempt is bounded by the pool's acquire
/// timeout, reported as `PoolTimedOut`.
pub async fn check_reachable(pool: &DbPool) -> Result<(), sqlx::Error> {
    let options = pool.connect_options();
    let timeout = pool.options().get_acquire_timeout();

    let conn = tokio::time::timeout(timeout, options.connect())
        .await
        .map_err(|_| sqlx::Error::PoolTimedOut)??;
    conn.close().await
}

/// Apply all pending migrations.
///
/// Each revision runs inside its own transaction: a failing statement rolls
/// the whole revision back and leaves the schema as it was.
///
/// # Errors
///
/// Returns an error if:
/// - An applied migration was modified after being applied (checksum mismatch)
/// - SQL errors in migration files
/// - Database errors during migration execution
pub async fn run_migrations(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Revert every applied migration, newest first.
pub async fn revert_migrations(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.undo(pool, 0).await
}

/// State of one embedded migration against the connected database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

/// List embedded migrations and whether each has been applied.
pub async fn migration_status(pool: &DbPool) -> Result<Vec<MigrationStatus>, AppError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let applied = conn.list_applied_migrations().await?;

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.iter().any(|a| a.version == m.version),
        })
        .collect())
}

/// Return the required tables missing from the `public` schema.
///
/// An empty result means the database is fully migrated.
pub async fn verify_schema(conn: &mut PgConnection) -> Result<Vec<&'static str>, AppError> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_all(&mut *conn)
    .await?;

    tracing::debug!(?tables, "tables found");

    Ok(REQUIRED_TABLES
        .into_iter()
        .filter(|required| !tables.iter().any(|t| t == required))
        .collect())
}
