//! Error types for the analytics facade.
//!
//! [`TallyError`] wraps every failure mode of opening and configuring a
//! store. Query methods on [`crate::Analytics`] return the narrower
//! [`tally_db::DbError`] directly.

/// Top-level error for opening and configuring an analytics store.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// Opening or migrating the database failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying data-layer error.
        #[from]
        source: tally_db::DbError,
    },

    /// The tracing subscriber could not be installed.
    #[error("telemetry error: {message}")]
    Telemetry {
        /// Description of the failure.
        message: String,
    },
}
