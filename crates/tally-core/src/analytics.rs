//! The [`Analytics`] handle: event ingestion, listing, counting, and cohorts.
//!
//! Construction is the migration gate. [`Analytics::open`] applies every
//! pending schema script before returning, so no query can ever reach an
//! un-migrated database.

use tally_db::{Database, DbError, SqliteConfig};
use tally_types::time;
use tally_types::{
    CohortRecord, CohortStateCount, CohortUpdate, CountQuery, Event, EventCount, EventId, Filter,
    ListQuery, NewEvent, VISIT,
};

use crate::config::TallyConfig;
use crate::error::TallyError;
use crate::useragent;

/// Handle to an analytics store.
///
/// Cloning is cheap; every clone shares the same connection pool and may be
/// used concurrently.
#[derive(Debug, Clone)]
pub struct Analytics {
    db: Database,
    domain: Option<String>,
}

impl Analytics {
    /// Open (creating if needed) and migrate the database described by
    /// `config`. Events that do not name a domain are recorded under
    /// `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or migrated.
    pub async fn open(config: &SqliteConfig, domain: Option<String>) -> Result<Self, DbError> {
        let db = Database::connect(config).await?;
        let version = db.run_migrations().await?;
        tracing::info!(schema_version = version, domain = ?domain, "Analytics store ready");
        Ok(Self { db, domain })
    }

    /// Open the store described by a loaded [`TallyConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Db`] if the database cannot be opened or migrated.
    pub async fn from_config(config: &TallyConfig) -> Result<Self, TallyError> {
        let sqlite = config.database.to_sqlite_config();
        Ok(Self::open(&sqlite, config.site.domain.clone()).await?)
    }

    /// Open a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if `SQLite` cannot allocate the database.
    pub async fn in_memory(domain: Option<String>) -> Result<Self, DbError> {
        Self::open(&SqliteConfig::in_memory(), domain).await
    }

    /// The underlying database handle.
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// The store-wide default domain.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Record one event and return its identifier.
    ///
    /// The kind defaults to [`VISIT`], the domain to the store-wide default,
    /// and the date to now (whole seconds). An explicit date is stored as
    /// given, fractional seconds included. The user-agent header, when
    /// present, is parsed into device and browser attributes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; nothing is stored in that case.
    pub async fn log_event(&self, data: NewEvent) -> Result<EventId, DbError> {
        let event = Event {
            id: EventId::generate(),
            kind: data.kind.unwrap_or_else(|| VISIT.to_owned()),
            url: data.url,
            domain: data.domain.or_else(|| self.domain.clone()),
            session: data.session,
            user_agent: useragent::parse_opt(data.user_agent.as_deref()),
            ip: data.ip,
            note: data.note,
            date: data.date.unwrap_or_else(time::now),
            extra: data.extra,
        };

        self.db.events().insert(&event).await?;
        Ok(event.id)
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// List events in insertion order with their extra attributes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn list_events(&self, query: &ListQuery) -> Result<Vec<Event>, DbError> {
        self.db.events().list(query).await
    }

    /// [`Analytics::list_events`] restricted to visits.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn list_visits(&self, query: &ListQuery) -> Result<Vec<Event>, DbError> {
        let query = ListQuery {
            filter: Some(visits_and(query.filter.as_ref())),
            ..query.clone()
        };
        self.db.events().list(&query).await
    }

    /// Fetch one event by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn get_event(&self, id: &EventId) -> Result<Option<Event>, DbError> {
        self.db.events().get(id).await
    }

    // -----------------------------------------------------------------------
    // Counting
    // -----------------------------------------------------------------------

    /// Count events, optionally by distinct session and/or per group.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count_events(&self, query: &CountQuery) -> Result<EventCount, DbError> {
        let store = self.db.events();
        let filter = query.filter.as_ref();
        match query.group_by {
            None => Ok(EventCount::Total(store.count(filter, query.unique).await?)),
            Some(group_by) => Ok(EventCount::Grouped(
                store.count_grouped(filter, query.unique, group_by).await?,
            )),
        }
    }

    /// [`Analytics::count_events`] restricted to visits.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count_visits(&self, query: &CountQuery) -> Result<EventCount, DbError> {
        let query = CountQuery {
            filter: Some(visits_and(query.filter.as_ref())),
            ..query.clone()
        };
        self.count_events(&query).await
    }

    /// Total number of events.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count_total(&self) -> Result<u64, DbError> {
        self.db.events().count(None, false).await
    }

    /// Total number of visits.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count_visit_total(&self) -> Result<u64, DbError> {
        self.db.events().count(Some(&Filter::visits()), false).await
    }

    // -----------------------------------------------------------------------
    // Cohorts
    // -----------------------------------------------------------------------

    /// Set a subject's current state within a cohort.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn update_cohort(
        &self,
        namespace: &str,
        update: CohortUpdate,
    ) -> Result<(), DbError> {
        self.db.cohorts().upsert(namespace, update).await
    }

    /// Subjects per (cohort, state) in `namespace`, ordered by cohort then state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count_cohort_states(
        &self,
        namespace: &str,
    ) -> Result<Vec<CohortStateCount>, DbError> {
        self.db.cohorts().count_states(namespace).await
    }

    /// The live record for one subject, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn cohort_record(
        &self,
        namespace: &str,
        cohort: i64,
        subject: i64,
    ) -> Result<Option<CohortRecord>, DbError> {
        self.db.cohorts().get(namespace, cohort, subject).await
    }

    /// Every record in `namespace`, ordered by cohort then subject.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn list_cohort_records(&self, namespace: &str) -> Result<Vec<CohortRecord>, DbError> {
        self.db.cohorts().list(namespace).await
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn visits_and(filter: Option<&Filter>) -> Filter {
    Filter::visits().and_opt(filter.cloned())
}
