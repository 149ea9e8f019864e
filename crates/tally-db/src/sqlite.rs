//! `SQLite` connection handling.
//!
//! The whole store lives in one `SQLite` file (or an in-memory database for
//! tests). `SQLite` serializes writers itself, so the pool needs no locking of
//! its own; WAL mode lets readers proceed while a write is in flight.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! to avoid requiring a database at build time. All queries are
//! parameterized to prevent SQL injection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::cohort_store::CohortStore;
use crate::error::DbError;
use crate::event_store::EventStore;
use crate::migrations;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default time to wait for a pooled connection, in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Default time a statement waits on a locked database, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A file on disk, created if missing.
    File(PathBuf),
    /// A private in-memory database. Dropped when the pool closes.
    Memory,
}

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file or in-memory database.
    pub location: DatabaseLocation,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
    /// How long a statement waits for another writer to finish.
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Create a configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Create a configuration for an in-memory database.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub const fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Connection pool handle to the analytics database.
///
/// Wraps a [`sqlx::SqlitePool`] and hands out the event and cohort stores.
/// Cloning is cheap and every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database described by `config`.
    ///
    /// Does not run migrations; call [`Database::run_migrations`] before
    /// issuing queries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the configuration is unusable.
    /// Returns [`DbError::Sqlite`] if the database cannot be opened.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        if config.max_connections == 0 {
            return Err(DbError::Config(
                "max_connections must be at least 1".to_owned(),
            ));
        }

        let base = SqliteConnectOptions::new()
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let (connect_options, pool_options) = match &config.location {
            DatabaseLocation::File(path) => (
                base.filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
                SqlitePoolOptions::new().max_connections(config.max_connections),
            ),
            DatabaseLocation::Memory => (
                base.in_memory(true),
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
            ),
        };

        let pool = pool_options
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await?;

        tracing::info!(
            location = ?config.location,
            max_connections = config.max_connections,
            "Opened SQLite database"
        );

        Ok(Self { pool })
    }

    /// Open a database file with default pool settings.
    ///
    /// Convenience wrapper around [`Database::connect`] with
    /// [`SqliteConfig::new`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened.
    pub async fn connect_path(path: &Path) -> Result<Self, DbError> {
        Self::connect(&SqliteConfig::new(path)).await
    }

    /// Open a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if `SQLite` cannot allocate the database.
    pub async fn connect_in_memory() -> Result<Self, DbError> {
        Self::connect(&SqliteConfig::in_memory()).await
    }

    /// Apply every migration newer than the stored schema version.
    ///
    /// Returns the schema version after migrating.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any script fails, or
    /// [`DbError::UnsupportedSchemaVersion`] if the file is from a newer build.
    pub async fn run_migrations(&self) -> Result<i64, DbError> {
        migrations::run(&self.pool).await
    }

    /// Read `PRAGMA user_version`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the pragma cannot be read.
    pub async fn schema_version(&self) -> Result<i64, DbError> {
        migrations::current_version(&self.pool).await
    }

    /// Operations on the `events` and `events_extra` tables.
    pub const fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.pool)
    }

    /// Operations on the `cohorts` table.
    pub const fn cohorts(&self) -> CohortStore<'_> {
        CohortStore::new(&self.pool)
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }
}
