//! `SQLite` data layer for the Tally analytics event logger.
//!
//! Everything lives in one embedded `SQLite` database: events, their extra
//! key/value attributes, and cohort state. `SQLite` does the indexing,
//! durability, and query execution; this crate owns the schema, builds
//! parameterized queries, and reshapes rows into `tally-types` values.
//!
//! # Layout
//!
//! ```text
//! Database (SqlitePool)
//!     |
//!     +-- run_migrations() ----> PRAGMA user_version gate
//!     |
//!     +-- events() ------------> EventStore
//!     |       |-- events        (one row per event)
//!     |       +-- events_extra  (one row per extra attribute)
//!     |
//!     +-- cohorts() -----------> CohortStore
//!             +-- cohorts       (current state per subject)
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- Connection pool and configuration
//! - [`migrations`] -- Embedded schema scripts and the version gate
//! - [`event_store`] -- Event insertion, listing, and counting
//! - [`cohort_store`] -- Cohort state upserts and state counts
//! - [`error`] -- Shared error types

pub mod cohort_store;
pub mod error;
pub mod event_store;
mod filter;
pub mod migrations;
pub mod sqlite;

// Re-export primary types for convenience.
pub use cohort_store::CohortStore;
pub use error::DbError;
pub use event_store::EventStore;
pub use sqlite::{Database, DatabaseLocation, SqliteConfig};
