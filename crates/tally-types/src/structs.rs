//! Core structs: events, queries, count results, and cohort records.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::GroupBy;
use crate::filter::Filter;
use crate::ids::EventId;

/// Kind assigned to events logged without an explicit kind.
pub const VISIT: &str = "visit";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Device and browser attributes parsed from a `User-Agent` header.
///
/// Every field is `None` when no user-agent was supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserAgentInfo {
    /// Phone-class device.
    pub is_mobile: Option<bool>,
    /// Desktop or laptop.
    pub is_desktop: Option<bool>,
    /// Crawler, spider, or scripted client.
    pub is_bot: Option<bool>,
    /// Browser name (`Chrome`, `Firefox`, ...).
    pub browser: Option<String>,
    /// Browser version string.
    pub version: Option<String>,
    /// Operating system (`Windows 7`, `Android`, ...).
    pub os: Option<String>,
    /// Platform family (`Microsoft Windows`, `iPhone`, ...).
    pub platform: Option<String>,
}

impl UserAgentInfo {
    /// Whether any attribute was recognized.
    pub const fn is_empty(&self) -> bool {
        self.is_mobile.is_none()
            && self.is_desktop.is_none()
            && self.is_bot.is_none()
            && self.browser.is_none()
            && self.version.is_none()
            && self.os.is_none()
            && self.platform.is_none()
    }
}

/// A recorded event, as persisted and as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique, insertion-ordered identifier.
    pub id: EventId,
    /// Event kind; `visit` unless the caller chose another.
    pub kind: String,
    /// Page URL.
    pub url: Option<String>,
    /// Site domain.
    pub domain: Option<String>,
    /// Session token used for unique counts.
    pub session: Option<String>,
    /// Parsed user-agent attributes.
    #[serde(flatten)]
    pub user_agent: UserAgentInfo,
    /// Client IP address.
    pub ip: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Event timestamp (UTC); explicit overrides keep their sub-second part.
    pub date: NaiveDateTime,
    /// Extra key/value attributes.
    pub extra: BTreeMap<String, String>,
}

impl Event {
    /// Whether this event is a page visit.
    pub fn is_visit(&self) -> bool {
        self.kind == VISIT
    }
}

/// Caller input for logging an event.
///
/// Everything is optional: the kind defaults to [`VISIT`], the domain to the
/// store-wide default, and the date to the insertion time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event kind; `None` means [`VISIT`].
    pub kind: Option<String>,
    /// Page URL.
    pub url: Option<String>,
    /// Domain override.
    pub domain: Option<String>,
    /// Session token.
    pub session: Option<String>,
    /// Raw `User-Agent` header.
    pub user_agent: Option<String>,
    /// Client IP address.
    pub ip: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Extra key/value attributes.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Timestamp override.
    pub date: Option<NaiveDateTime>,
}

impl NewEvent {
    /// An event of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// A page visit to `url`.
    pub fn visit(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the page URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Override the store-wide domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the session token.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Set the raw `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the client IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set the free-text note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Add one extra attribute; a repeated key replaces the earlier value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Override the event timestamp.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Filtering and pagination for event listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Condition events must satisfy; `None` matches everything.
    pub filter: Option<Filter>,
    /// Maximum number of events to return.
    pub limit: Option<u32>,
    /// Number of matching events to skip. Without a limit, every event
    /// after the offset is returned.
    pub offset: Option<u32>,
}

impl ListQuery {
    /// An unfiltered, unpaginated listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the listing to events matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Cap the number of events returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` matching events.
    #[must_use]
    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Options for counting events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountQuery {
    /// Count distinct non-null sessions instead of events.
    pub unique: bool,
    /// Partition the count; `None` yields a single total.
    pub group_by: Option<GroupBy>,
    /// Condition events must satisfy; `None` matches everything.
    pub filter: Option<Filter>,
}

impl CountQuery {
    /// Count every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count distinct sessions instead of events.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Partition the count.
    #[must_use]
    pub const fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = Some(group_by);
        self
    }

    /// Count only events matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// One partition of a grouped count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GroupCount {
    /// Group value rendered as text; `None` for events where it is null.
    pub key: Option<String>,
    /// Events (or sessions) in the group.
    pub count: u64,
}

/// Result of a count query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventCount {
    /// A single scalar count.
    Total(u64),
    /// Counts per group, ordered by key ascending.
    Grouped(Vec<GroupCount>),
}

impl EventCount {
    /// The scalar count, if the query was not grouped.
    pub const fn total(&self) -> Option<u64> {
        match self {
            Self::Total(count) => Some(*count),
            Self::Grouped(_) => None,
        }
    }

    /// The per-group counts, if the query was grouped.
    pub fn groups(&self) -> Option<&[GroupCount]> {
        match self {
            Self::Total(_) => None,
            Self::Grouped(groups) => Some(groups),
        }
    }
}

// ---------------------------------------------------------------------------
// Cohorts
// ---------------------------------------------------------------------------

/// New current state for a subject within a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortUpdate {
    /// Cohort identifier.
    pub cohort: i64,
    /// Subject identifier.
    pub subject: i64,
    /// State the subject is now in.
    pub state: i64,
}

/// The live record for one subject in one cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CohortRecord {
    /// Cohort namespace.
    pub namespace: String,
    /// Cohort identifier.
    pub cohort: i64,
    /// Subject identifier.
    pub subject: i64,
    /// Current state.
    pub state: i64,
    /// When the state was last written.
    pub updated_at: NaiveDateTime,
}

/// Number of subjects currently in a state within a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CohortStateCount {
    /// Cohort identifier.
    pub cohort: i64,
    /// State identifier.
    pub state: i64,
    /// Subjects currently in the state.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields() {
        let event = NewEvent::visit("/index.html")
            .with_session("1")
            .with_extra("foo", "asdf")
            .with_extra("foo", "qwer");
        assert_eq!(event.kind, None);
        assert_eq!(event.url.as_deref(), Some("/index.html"));
        assert_eq!(event.session.as_deref(), Some("1"));
        assert_eq!(event.extra.get("foo").map(String::as_str), Some("qwer"));
    }

    #[test]
    fn default_user_agent_is_empty() {
        assert!(UserAgentInfo::default().is_empty());
        let info = UserAgentInfo {
            browser: Some("Chrome".to_owned()),
            ..UserAgentInfo::default()
        };
        assert!(!info.is_empty());
    }

    #[test]
    fn event_serializes_user_agent_flat() {
        let event = Event {
            id: EventId::from("0000000000001".to_owned()),
            kind: VISIT.to_owned(),
            url: Some("/".to_owned()),
            domain: None,
            session: None,
            user_agent: UserAgentInfo {
                is_desktop: Some(true),
                ..UserAgentInfo::default()
            },
            ip: None,
            note: None,
            date: crate::time::now(),
            extra: BTreeMap::new(),
        };
        let value = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(value.get("is_desktop"), Some(&serde_json::Value::Bool(true)));
        assert!(value.get("user_agent").is_none());
        assert!(event.is_visit());
    }

    #[test]
    fn event_count_accessors() {
        assert_eq!(EventCount::Total(3).total(), Some(3));
        assert!(EventCount::Total(3).groups().is_none());
        let grouped = EventCount::Grouped(vec![GroupCount {
            key: Some("/".to_owned()),
            count: 2,
        }]);
        assert_eq!(grouped.total(), None);
        assert_eq!(grouped.groups().map(<[GroupCount]>::len), Some(1));
    }
}
