//! SQLite connection setup and schema versioning
//!
//! `database.path` names either a file or `:memory:`. A file database is
//! opened in WAL mode so `ledgersyncd` can answer reads while a chunk is
//! writing. An in-memory database lives in a single connection, since
//! every new connection would see an empty schema.
//!
//! The applied schema version is kept in `PRAGMA user_version`; each
//! migration runs in its own transaction together with the version bump.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use ledgersync_core::config::DatabaseConfig;

use crate::StoreError;

/// Migrations in order, keyed by the schema version they produce
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/20261001_initial.sql"))];

/// Schema version this build writes
pub const SCHEMA_VERSION: i64 = 1;

/// An open, migrated SQLite pool
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database described by `config` and brings its schema up
    /// to [`SCHEMA_VERSION`]
    ///
    /// The parent directory of a file database is created when missing.
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` when the file cannot be opened, `MigrationFailed`
    /// when the schema cannot be applied or was written by a newer build.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if config.is_in_memory() {
            return Self::in_memory().await;
        }

        let path = config.path.as_path();
        create_parent(path)?;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("{}: {e}", path.display())))?;

        let version = migrate(&pool).await?;
        info!(
            path = %path.display(),
            max_connections = config.max_connections,
            schema_version = version,
            "Database opened"
        );
        Ok(Self { pool })
    }

    /// Opens a private in-memory database with the current schema
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!(":memory: {e}")))?;

        migrate(&pool).await?;
        debug!("In-memory database opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::ConnectionFailed(format!("{}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

/// Applies every migration newer than the stored version; returns the
/// version the database ends at
async fn migrate(pool: &SqlitePool) -> Result<i64, StoreError> {
    let failed = |e: sqlx::Error| StoreError::MigrationFailed(e.to_string());

    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(failed)?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::MigrationFailed(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let mut tx = pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(failed)?;
        // PRAGMA does not take bind parameters
        sqlx::raw_sql(&format!("PRAGMA user_version = {version}"))
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;
        debug!(version, "Schema migration applied");
    }
    Ok(SCHEMA_VERSION)
}
