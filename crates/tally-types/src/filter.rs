//! Structured filter expressions over events.
//!
//! A [`Filter`] is a boolean condition over the fixed event columns and the
//! extra-attribute relation. Storage compiles it to a parameterized `WHERE`
//! clause: columns come from [`EventColumn`], and every [`FilterValue`] is
//! bound rather than interpolated.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::enums::{CompareOp, EventColumn};
use crate::structs::VISIT;

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean, stored as `0`/`1`.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Timestamp, compared in the persisted text layout.
    Timestamp(NaiveDateTime),
    /// Free text.
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// A boolean condition over events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// `column <op> value`
    Compare {
        /// Column on the left-hand side.
        column: EventColumn,
        /// Comparison operator.
        op: CompareOp,
        /// Bound literal on the right-hand side.
        value: FilterValue,
    },
    /// `column IS NULL`
    IsNull(EventColumn),
    /// `column IS NOT NULL`
    IsNotNull(EventColumn),
    /// `column IN (values...)`; an empty list matches nothing.
    In {
        /// Column tested for membership.
        column: EventColumn,
        /// Candidate values.
        values: Vec<FilterValue>,
    },
    /// The event carries extra attribute `key`, optionally with exactly `value`.
    Extra {
        /// Extra attribute key.
        key: String,
        /// Required value, or `None` to match any value.
        value: Option<String>,
    },
    /// All conditions hold; an empty list matches everything.
    And(Vec<Self>),
    /// Any condition holds; an empty list matches nothing.
    Or(Vec<Self>),
    /// The condition does not hold.
    Not(Box<Self>),
}

impl Filter {
    /// `column <op> value`
    pub fn compare(column: EventColumn, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        Self::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column <> value`
    pub fn not_eq(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::NotEq, value)
    }

    /// `column < value`
    pub fn lt(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// `column <= value`
    pub fn lte(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    /// `column > value`
    pub fn gt(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// `column >= value`
    pub fn gte(column: EventColumn, value: impl Into<FilterValue>) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    /// `column LIKE pattern`
    pub fn like(column: EventColumn, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, FilterValue::Text(pattern.into()))
    }

    /// `kind = kind`
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::eq(EventColumn::Kind, FilterValue::Text(kind.into()))
    }

    /// `kind = 'visit'`
    pub fn visits() -> Self {
        Self::kind(VISIT)
    }

    /// Events carrying extra attribute `key` with exactly `value`.
    pub fn extra_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Extra {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Events carrying extra attribute `key` with any value.
    pub fn has_extra(key: impl Into<String>) -> Self {
        Self::Extra {
            key: key.into(),
            value: None,
        }
    }

    /// Conjoin two filters, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::And(parts)
    }

    /// Conjoin with an optional filter; `None` leaves `self` unchanged.
    #[must_use]
    pub fn and_opt(self, other: Option<Self>) -> Self {
        match other {
            Some(other) => self.and(other),
            None => self,
        }
    }

    /// Disjoin two filters.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(vec![self, other])
    }

    /// Negate the filter.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_nested_conjunctions() {
        let f = Filter::visits()
            .and(Filter::eq(EventColumn::Domain, "foo.com"))
            .and(Filter::has_extra("foo"));
        assert!(matches!(&f, Filter::And(parts) if parts.len() == 3), "{f:?}");
    }

    #[test]
    fn and_opt_none_is_identity() {
        let f = Filter::visits().and_opt(None);
        assert_eq!(f, Filter::visits());
    }

    #[test]
    fn filter_deserializes_from_json() {
        let json = r#"{"compare":{"column":"url","op":"eq","value":"/index.html"}}"#;
        let f: Result<Filter, _> = serde_json::from_str(json);
        assert_eq!(f.ok(), Some(Filter::eq(EventColumn::Url, "/index.html")));
    }
}
