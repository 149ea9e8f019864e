//! Enumeration types for building event queries.
//!
//! Column names and operators come from closed enums so a query can never
//! name something the schema does not have. Storage renders them to SQL;
//! callers only ever supply literal values, which are always bound.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A fixed column of the `events` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventColumn {
    /// Event identifier.
    Id,
    /// Event kind (`visit`, `click`, ...).
    Kind,
    /// Page URL.
    Url,
    /// Site domain.
    Domain,
    /// Session token.
    Session,
    /// Parsed mobile flag.
    IsMobile,
    /// Parsed desktop flag.
    IsDesktop,
    /// Parsed bot flag.
    IsBot,
    /// Parsed browser name.
    Browser,
    /// Parsed browser version.
    Version,
    /// Parsed operating system.
    Os,
    /// Parsed platform.
    Platform,
    /// Client IP address.
    Ip,
    /// Free-text note.
    Note,
    /// Event timestamp.
    Date,
}

impl EventColumn {
    /// Every column, in schema order.
    pub const ALL: [Self; 15] = [
        Self::Id,
        Self::Kind,
        Self::Url,
        Self::Domain,
        Self::Session,
        Self::IsMobile,
        Self::IsDesktop,
        Self::IsBot,
        Self::Browser,
        Self::Version,
        Self::Os,
        Self::Platform,
        Self::Ip,
        Self::Note,
        Self::Date,
    ];

    /// Column name in the `events` table.
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Kind => "kind",
            Self::Url => "url",
            Self::Domain => "domain",
            Self::Session => "session",
            Self::IsMobile => "is_mobile",
            Self::IsDesktop => "is_desktop",
            Self::IsBot => "is_bot",
            Self::Browser => "browser",
            Self::Version => "version",
            Self::Os => "os",
            Self::Platform => "platform",
            Self::Ip => "ip",
            Self::Note => "note",
            Self::Date => "date",
        }
    }
}

impl core::fmt::Display for EventColumn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A binary comparison between a column and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE` with `%`/`_` wildcards.
    Like,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// How grouped counts partition their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GroupBy {
    /// Calendar day of the event timestamp (`YYYY-MM-DD`).
    Date,
    /// Distinct values of a column.
    Column(EventColumn),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_unique() {
        let mut names: Vec<&str> = EventColumn::ALL.iter().map(|c| c.column_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventColumn::ALL.len());
    }

    #[test]
    fn group_by_serializes_snake_case() {
        let json = serde_json::to_string(&GroupBy::Column(EventColumn::IsBot)).ok();
        assert_eq!(json.as_deref(), Some(r#"{"column":"is_bot"}"#));
        let json = serde_json::to_string(&GroupBy::Date).ok();
        assert_eq!(json.as_deref(), Some(r#""date""#));
    }
}
