//! Schema migrations gated on `PRAGMA user_version`.
//!
//! Each script is embedded at build time and numbered by its position in
//! [`MIGRATIONS`]. A database at version `n` has had the first `n` scripts
//! applied. Each script runs in its own transaction together with the
//! version bump, so a failed script leaves the version untouched.

use sqlx::{Connection, SqlitePool};

use crate::error::DbError;

/// A single embedded schema script.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Ordered schema scripts. Append only; never edit a released script.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "events",
        sql: include_str!("../migrations/0001_events.sql"),
    },
    Migration {
        name: "cohorts",
        sql: include_str!("../migrations/0002_cohorts.sql"),
    },
];

/// Highest schema version this build can produce.
pub fn latest_version() -> i64 {
    i64::try_from(MIGRATIONS.len()).unwrap_or(i64::MAX)
}

/// Read `PRAGMA user_version`.
pub(crate) async fn current_version(pool: &SqlitePool) -> Result<i64, DbError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Apply every script newer than the stored version and return the new version.
pub(crate) async fn run(pool: &SqlitePool) -> Result<i64, DbError> {
    let mut conn = pool.acquire().await?;

    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    let supported = latest_version();
    if current > supported {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current,
            supported,
        });
    }

    for (version, migration) in (1_i64..).zip(MIGRATIONS) {
        if version <= current {
            continue;
        }

        let mut tx = conn.begin().await?;
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Migration { version, source })?;
        // PRAGMA arguments cannot be bound; `version` is a trusted integer.
        let bump = format!("PRAGMA user_version = {version}");
        sqlx::raw_sql(&bump)
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Migration { version, source })?;
        tx.commit().await?;

        tracing::info!(version, name = migration.name, "Applied schema migration");
    }

    if current == supported {
        tracing::debug!(version = current, "Schema up to date");
    }

    Ok(supported)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use crate::sqlite::Database;

    use super::*;

    #[tokio::test]
    async fn fresh_database_migrates_to_latest() {
        let db = Database::connect_in_memory().await.expect("connect");
        assert_eq!(db.schema_version().await.expect("version"), 0);
        let version = db.run_migrations().await.expect("migrate");
        assert_eq!(version, latest_version());
        assert_eq!(db.schema_version().await.expect("version"), latest_version());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.expect("connect");
        db.run_migrations().await.expect("first run");
        let version = db.run_migrations().await.expect("second run");
        assert_eq!(version, latest_version());
    }

    #[tokio::test]
    async fn newer_schema_is_rejected() {
        let db = Database::connect_in_memory().await.expect("connect");
        let too_new = latest_version().saturating_add(1);
        sqlx::raw_sql(&format!("PRAGMA user_version = {too_new}"))
            .execute(db.pool())
            .await
            .expect("set version");

        let result = db.run_migrations().await;
        assert!(matches!(
            result,
            Err(DbError::UnsupportedSchemaVersion { found, .. }) if found == too_new
        ));
    }
}
