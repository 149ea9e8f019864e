//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with context about which operation failed.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed (I/O, constraint violation, ...).
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A schema migration script failed to apply.
    #[error("migration {version} failed: {source}")]
    Migration {
        /// Schema version the script would have produced.
        version: i64,
        /// The underlying `SQLite` error.
        source: sqlx::Error,
    },

    /// The database was written by a newer release.
    #[error("schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchemaVersion {
        /// Version recorded in `PRAGMA user_version`.
        found: i64,
        /// Highest version this build knows how to migrate to.
        supported: i64,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
