//! Cohort state tracking.
//!
//! A cohort record holds the current state of one subject within one cohort
//! of a namespace. Updates overwrite the record in place, so state counts are
//! always a live snapshot rather than a history of transitions.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tally_types::time::{self, format_timestamp};
use tally_types::{CohortRecord, CohortStateCount, CohortUpdate};

use crate::error::DbError;

/// Operations on the `cohorts` table.
pub struct CohortStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CohortStore<'a> {
    /// Create a new cohort store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Set the subject's current state, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the upsert fails.
    pub async fn upsert(&self, namespace: &str, update: CohortUpdate) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO cohorts (namespace, cohort, subject, state, updated_at)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT (namespace, cohort, subject)
              DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(namespace)
        .bind(update.cohort)
        .bind(update.subject)
        .bind(update.state)
        .bind(format_timestamp(&time::now()))
        .execute(self.pool)
        .await?;

        tracing::debug!(
            namespace,
            cohort = update.cohort,
            subject = update.subject,
            state = update.state,
            "Updated cohort state"
        );
        Ok(())
    }

    /// Count subjects per (cohort, state), ordered by cohort then state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count_states(&self, namespace: &str) -> Result<Vec<CohortStateCount>, DbError> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r"SELECT cohort, state, COUNT(*) AS count
              FROM cohorts
              WHERE namespace = ?
              GROUP BY cohort, state
              ORDER BY cohort, state",
        )
        .bind(namespace)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cohort, state, count)| CohortStateCount {
                cohort,
                state,
                count: u64::try_from(count).unwrap_or(0),
            })
            .collect())
    }

    /// Load the live record for one subject.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn get(
        &self,
        namespace: &str,
        cohort: i64,
        subject: i64,
    ) -> Result<Option<CohortRecord>, DbError> {
        let row = sqlx::query_as::<_, CohortRow>(
            r"SELECT namespace, cohort, subject, state, updated_at
              FROM cohorts
              WHERE namespace = ? AND cohort = ? AND subject = ?",
        )
        .bind(namespace)
        .bind(cohort)
        .bind(subject)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CohortRecord::from))
    }

    /// List every record in a namespace, ordered by cohort then subject.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list(&self, namespace: &str) -> Result<Vec<CohortRecord>, DbError> {
        let rows = sqlx::query_as::<_, CohortRow>(
            r"SELECT namespace, cohort, subject, state, updated_at
              FROM cohorts
              WHERE namespace = ?
              ORDER BY cohort, subject",
        )
        .bind(namespace)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CohortRecord::from).collect())
    }
}

/// A row from the `cohorts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CohortRow {
    namespace: String,
    cohort: i64,
    subject: i64,
    state: i64,
    updated_at: NaiveDateTime,
}

impl From<CohortRow> for CohortRecord {
    fn from(row: CohortRow) -> Self {
        Self {
            namespace: row.namespace,
            cohort: row.cohort,
            subject: row.subject,
            state: row.state,
            updated_at: row.updated_at,
        }
    }
}
