//! Event store operations: insert, list, and count.
//!
//! Each event is one row in `events` plus one row per extra attribute in
//! `events_extra`. Listings run two queries, one for the page of events and
//! one for the extras of exactly those events, and fold the extras into a
//! map per event. Counting never touches `events_extra` except through
//! `EXISTS` filters, so no row is ever counted twice.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tally_types::time::format_timestamp;
use tally_types::{
    Event, EventColumn, EventId, Filter, GroupBy, GroupCount, ListQuery, UserAgentInfo,
};

use crate::error::DbError;
use crate::filter::push_where;

/// Maximum event ids bound into one `events_extra` lookup.
const EXTRA_LOOKUP_CHUNK: usize = 500;

const EVENT_COLUMNS: &str = "events.id, events.kind, events.url, events.domain, events.session, \
     events.is_mobile, events.is_desktop, events.is_bot, events.browser, events.version, \
     events.os, events.platform, events.ip, events.note, events.date";

/// Operations on the `events` and `events_extra` tables.
pub struct EventStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one event and its extra attributes.
    ///
    /// The event row and every extra row are written in one transaction, so
    /// either all of them are committed or none are.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails (for example, a
    /// duplicate identifier).
    pub async fn insert(&self, event: &Event) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO events (id, kind, url, domain, session, is_mobile, is_desktop, is_bot, browser, version, os, platform, ip, note, date)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.as_str())
        .bind(&event.kind)
        .bind(&event.url)
        .bind(&event.domain)
        .bind(&event.session)
        .bind(event.user_agent.is_mobile)
        .bind(event.user_agent.is_desktop)
        .bind(event.user_agent.is_bot)
        .bind(&event.user_agent.browser)
        .bind(&event.user_agent.version)
        .bind(&event.user_agent.os)
        .bind(&event.user_agent.platform)
        .bind(&event.ip)
        .bind(&event.note)
        .bind(format_timestamp(&event.date))
        .execute(&mut *tx)
        .await?;

        for (key, value) in &event.extra {
            sqlx::query(
                r"INSERT INTO events_extra (event_id, key, value) VALUES (?, ?, ?)
                  ON CONFLICT (event_id, key) DO UPDATE SET value = excluded.value",
            )
            .bind(event.id.as_str())
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            id = %event.id,
            kind = %event.kind,
            extra = event.extra.len(),
            "Inserted event"
        );
        Ok(())
    }

    /// List events in insertion order, with their extra attributes.
    ///
    /// An offset without a limit returns every matching event after the
    /// offset.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if either query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Event>, DbError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {EVENT_COLUMNS} FROM events"));
        push_where(&mut qb, query.filter.as_ref());
        qb.push(" ORDER BY events.id");
        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                qb.push(" LIMIT ").push_bind(i64::from(limit));
                if let Some(offset) = offset {
                    qb.push(" OFFSET ").push_bind(i64::from(offset));
                }
            }
            (None, Some(offset)) => {
                // SQLite only accepts OFFSET after LIMIT; -1 means unbounded.
                qb.push(" LIMIT -1 OFFSET ").push_bind(i64::from(offset));
            }
            (None, None) => {}
        }

        let rows: Vec<EventRow> = qb.build_query_as().fetch_all(self.pool).await?;
        let mut extras = self.extras_for(&rows).await?;

        let events: Vec<Event> = rows
            .into_iter()
            .map(|row| {
                let extra = extras.remove(&row.id).unwrap_or_default();
                row.into_event(extra)
            })
            .collect();

        tracing::debug!(count = events.len(), "Listed events");
        Ok(events)
    }

    /// Fetch one event by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn get(&self, id: &EventId) -> Result<Option<Event>, DbError> {
        let filter = Filter::eq(EventColumn::Id, id.as_str());
        let query = ListQuery::new().with_filter(filter).with_limit(1);
        Ok(self.list(&query).await?.into_iter().next())
    }

    /// Count matching events, or distinct non-null sessions when `unique`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count(&self, filter: Option<&Filter>, unique: bool) -> Result<u64, DbError> {
        let filter = effective_filter(filter, unique);
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM events",
            count_expr(unique)
        ));
        push_where(&mut qb, filter.as_ref());

        let count: i64 = qb.build_query_scalar().fetch_one(self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Count matching events partitioned by `group_by`, ordered by key.
    ///
    /// With `unique`, each group counts distinct non-null sessions and
    /// events without a session are left out entirely.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count_grouped(
        &self,
        filter: Option<&Filter>,
        unique: bool,
        group_by: GroupBy,
    ) -> Result<Vec<GroupCount>, DbError> {
        let filter = effective_filter(filter, unique);
        let key_expr = match group_by {
            GroupBy::Date => "date(events.date)".to_owned(),
            GroupBy::Column(column) => format!("CAST(events.{} AS TEXT)", column.column_name()),
        };

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {key_expr} AS group_key, {} AS count FROM events",
            count_expr(unique)
        ));
        push_where(&mut qb, filter.as_ref());
        qb.push(" GROUP BY group_key ORDER BY group_key");

        let rows: Vec<(Option<String>, i64)> = qb.build_query_as().fetch_all(self.pool).await?;

        tracing::debug!(?group_by, groups = rows.len(), unique, "Counted grouped events");
        Ok(rows
            .into_iter()
            .map(|(key, count)| GroupCount {
                key,
                count: u64::try_from(count).unwrap_or(0),
            })
            .collect())
    }

    /// Load extra attributes for `rows`, keyed by event id.
    async fn extras_for(
        &self,
        rows: &[EventRow],
    ) -> Result<HashMap<String, BTreeMap<String, String>>, DbError> {
        let mut extras: HashMap<String, BTreeMap<String, String>> = HashMap::new();

        for chunk in rows.chunks(EXTRA_LOOKUP_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT event_id, key, value FROM events_extra WHERE event_id IN (",
            );
            let mut ids = qb.separated(", ");
            for row in chunk {
                ids.push_bind(row.id.clone());
            }
            ids.push_unseparated(") ORDER BY rowid");

            let pairs: Vec<(String, String, String)> =
                qb.build_query_as().fetch_all(self.pool).await?;
            for (event_id, key, value) in pairs {
                extras.entry(event_id).or_default().insert(key, value);
            }
        }

        Ok(extras)
    }
}

/// Unique counts only ever consider events that carry a session.
fn effective_filter(filter: Option<&Filter>, unique: bool) -> Option<Filter> {
    if unique {
        Some(Filter::IsNotNull(EventColumn::Session).and_opt(filter.cloned()))
    } else {
        filter.cloned()
    }
}

const fn count_expr(unique: bool) -> &'static str {
    if unique {
        "COUNT(DISTINCT events.session)"
    } else {
        "COUNT(*)"
    }
}

/// A row from the `events` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: String,
    kind: String,
    url: Option<String>,
    domain: Option<String>,
    session: Option<String>,
    is_mobile: Option<bool>,
    is_desktop: Option<bool>,
    is_bot: Option<bool>,
    browser: Option<String>,
    version: Option<String>,
    os: Option<String>,
    platform: Option<String>,
    ip: Option<String>,
    note: Option<String>,
    date: NaiveDateTime,
}

impl EventRow {
    fn into_event(self, extra: BTreeMap<String, String>) -> Event {
        Event {
            id: EventId::from(self.id),
            kind: self.kind,
            url: self.url,
            domain: self.domain,
            session: self.session,
            user_agent: UserAgentInfo {
                is_mobile: self.is_mobile,
                is_desktop: self.is_desktop,
                is_bot: self.is_bot,
                browser: self.browser,
                version: self.version,
                os: self.os,
                platform: self.platform,
            },
            ip: self.ip,
            note: self.note,
            date: self.date,
            extra,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;
    use tally_types::{CompareOp, VISIT, time};

    use super::*;
    use crate::sqlite::Database;

    async fn migrated() -> Database {
        let db = Database::connect_in_memory().await.expect("connect");
        db.run_migrations().await.expect("migrate");
        db
    }

    fn event(kind: &str, url: &str, session: Option<&str>) -> Event {
        Event {
            id: EventId::generate(),
            kind: kind.to_owned(),
            url: Some(url.to_owned()),
            domain: Some("mysite.com".to_owned()),
            session: session.map(str::to_owned),
            user_agent: UserAgentInfo::default(),
            ip: None,
            note: None,
            date: time::now(),
            extra: BTreeMap::new(),
        }
    }

    fn old_date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 6, 1)
            .and_then(|d| d.and_hms_opt(19, 30, 27))
            .expect("valid date")
    }

    #[tokio::test]
    async fn insert_and_list_round_trip() {
        let db = migrated().await;
        let mut e = event(VISIT, "/index.html", Some("1"));
        e.user_agent.browser = Some("Chrome".to_owned());
        e.user_agent.is_desktop = Some(true);
        e.extra.insert("foo".to_owned(), "asdf".to_owned());
        e.extra.insert("bar".to_owned(), "100".to_owned());
        db.events().insert(&e).await.expect("insert");

        let listed = db.events().list(&ListQuery::new()).await.expect("list");
        assert_eq!(listed, vec![e]);
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_and_paginates() {
        let db = migrated().await;
        let mut ids = Vec::new();
        for i in 0..10 {
            let e = event(VISIT, &format!("/{i}.html"), None);
            ids.push(e.id.clone());
            db.events().insert(&e).await.expect("insert");
        }

        let all = db.events().list(&ListQuery::new()).await.expect("list");
        let listed: Vec<EventId> = all.into_iter().map(|e| e.id).collect();
        assert_eq!(listed, ids);

        let store = db.events();
        let len = |query: ListQuery| {
            let store = &store;
            async move { store.list(&query).await.expect("list").len() }
        };
        assert_eq!(len(ListQuery::new().with_limit(5)).await, 5);
        assert_eq!(len(ListQuery::new().with_limit(50)).await, 10);
        assert_eq!(len(ListQuery::new().with_offset(8)).await, 2);
        let page = store
            .list(&ListQuery::new().with_offset(8).with_limit(1))
            .await
            .expect("page");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[8]);
    }

    #[tokio::test]
    async fn extras_do_not_duplicate_rows() {
        let db = migrated().await;
        let mut e = event(VISIT, "/index.html", None);
        for i in 0..5 {
            e.extra.insert(format!("k{i}"), format!("v{i}"));
        }
        db.events().insert(&e).await.expect("insert");
        db.events()
            .insert(&event(VISIT, "/foo.html", None))
            .await
            .expect("insert");

        let listed = db.events().list(&ListQuery::new()).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].extra.len(), 5);
        assert!(listed[1].extra.is_empty());
        assert_eq!(db.events().count(None, false).await.expect("count"), 2);

        let with_extra = db
            .events()
            .count(Some(&Filter::has_extra("k3")), false)
            .await
            .expect("count");
        assert_eq!(with_extra, 1);
    }

    #[tokio::test]
    async fn failed_insert_leaves_nothing_behind() {
        let db = migrated().await;
        let mut e = event(VISIT, "/index.html", None);
        db.events().insert(&e).await.expect("insert");

        // Same id again: the event row violates the primary key, so the
        // new extra rows must not be committed either.
        e.extra.insert("orphan".to_owned(), "1".to_owned());
        assert!(db.events().insert(&e).await.is_err());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events_extra")
            .fetch_one(db.pool())
            .await
            .expect("count extras");
        assert_eq!(orphans, 0);
        assert_eq!(db.events().count(None, false).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn unique_counts_ignore_missing_sessions() {
        let db = migrated().await;
        for (session, kind) in [
            (None, VISIT),
            (Some("1"), VISIT),
            (Some("2"), VISIT),
            (Some("1"), VISIT),
            (Some("2"), "click"),
            (None, "click"),
        ] {
            db.events()
                .insert(&event(kind, "/index.html", session))
                .await
                .expect("insert");
        }

        let store = db.events();
        assert_eq!(store.count(None, false).await.expect("count"), 6);
        assert_eq!(store.count(None, true).await.expect("count"), 2);
        let clicks = Filter::kind("click");
        assert_eq!(store.count(Some(&clicks), true).await.expect("count"), 1);
        assert_eq!(store.count(Some(&clicks), false).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn grouped_by_url_is_ordered_by_key() {
        let db = migrated().await;
        for (url, n) in [("/index.html", 6), ("/foo.html", 2), ("/bar.html", 2)] {
            for _ in 0..n {
                db.events()
                    .insert(&event(VISIT, url, None))
                    .await
                    .expect("insert");
            }
        }

        let groups = db
            .events()
            .count_grouped(None, false, GroupBy::Column(EventColumn::Url))
            .await
            .expect("group");
        let flat: Vec<(Option<&str>, u64)> =
            groups.iter().map(|g| (g.key.as_deref(), g.count)).collect();
        assert_eq!(
            flat,
            vec![
                (Some("/bar.html"), 2),
                (Some("/foo.html"), 2),
                (Some("/index.html"), 6),
            ]
        );
    }

    #[tokio::test]
    async fn date_override_drives_filters_and_grouping() {
        let db = migrated().await;
        let mut old = event(VISIT, "/index.html", Some("2"));
        old.date = old_date();
        db.events().insert(&old).await.expect("insert");
        for _ in 0..3 {
            db.events()
                .insert(&event(VISIT, "/index.html", Some("1")))
                .await
                .expect("insert");
        }

        let store = db.events();
        let listed = store
            .list(&ListQuery::new().with_filter(Filter::eq(EventColumn::Date, old_date())))
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].date, old_date());

        let newer = Filter::compare(EventColumn::Date, CompareOp::Gt, old_date());
        assert_eq!(store.count(Some(&newer), false).await.expect("count"), 3);

        let by_day = store
            .count_grouped(None, false, GroupBy::Date)
            .await
            .expect("group");
        assert_eq!(by_day.len(), 2);
        assert_eq!(by_day[0].key.as_deref(), Some("2017-06-01"));
        assert_eq!(by_day[0].count, 1);
        assert_eq!(by_day[1].count, 3);

        let unique_by_day = store
            .count_grouped(None, true, GroupBy::Date)
            .await
            .expect("group");
        assert_eq!(unique_by_day[0].count, 1);
        assert_eq!(unique_by_day[1].count, 1);
    }

    #[tokio::test]
    async fn every_operator_runs_against_storage() {
        let db = migrated().await;
        let day = |n: i64| {
            old_date()
                .checked_add_signed(chrono::TimeDelta::days(n))
                .expect("in range")
        };
        for (i, (url, session)) in [
            ("/docs/intro", Some("1")),
            ("/docs/setup", Some("2")),
            ("/blog/launch", Some("1")),
            ("/blog/launch", Some("3")),
            ("/blog/launch", None),
        ]
        .into_iter()
        .enumerate()
        {
            let mut e = event(VISIT, url, session);
            e.date = day(i64::try_from(i).expect("small index"));
            db.events().insert(&e).await.expect("insert");
        }

        let db = &db;
        let count = |filter: Filter| async move {
            db.events()
                .count(Some(&filter), false)
                .await
                .expect("count")
        };

        assert_eq!(count(Filter::like(EventColumn::Url, "/docs/%")).await, 2);
        assert_eq!(count(Filter::not_eq(EventColumn::Url, "/blog/launch")).await, 2);
        assert_eq!(count(Filter::lt(EventColumn::Date, day(2))).await, 2);
        assert_eq!(count(Filter::lte(EventColumn::Date, day(2))).await, 3);
        assert_eq!(count(Filter::gte(EventColumn::Date, day(3))).await, 2);
        assert_eq!(count(Filter::gt(EventColumn::Date, day(4))).await, 0);
        assert_eq!(count(Filter::IsNull(EventColumn::Session)).await, 1);
        assert_eq!(count(Filter::eq(EventColumn::Session, "1").negate()).await, 2);

        let unique_by_url = db
            .events()
            .count_grouped(None, true, GroupBy::Column(EventColumn::Url))
            .await
            .expect("group");
        let flat: Vec<(Option<&str>, u64)> = unique_by_url
            .iter()
            .map(|g| (g.key.as_deref(), g.count))
            .collect();
        assert_eq!(
            flat,
            vec![
                (Some("/blog/launch"), 2),
                (Some("/docs/intro"), 1),
                (Some("/docs/setup"), 1),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_extra_keys_keep_last_value() {
        let db = migrated().await;
        let e = event(VISIT, "/index.html", None);
        db.events().insert(&e).await.expect("insert");
        sqlx::query(
            r"INSERT INTO events_extra (event_id, key, value) VALUES (?, 'foo', 'second')
              ON CONFLICT (event_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(e.id.as_str())
        .execute(db.pool())
        .await
        .expect("upsert");

        let fetched = db.events().get(&e.id).await.expect("get").expect("present");
        assert_eq!(fetched.extra.get("foo").map(String::as_str), Some("second"));
    }

    #[tokio::test]
    async fn get_missing_event_is_none() {
        let db = migrated().await;
        let missing = db.events().get(&EventId::generate()).await.expect("get");
        assert!(missing.is_none());
    }
}
