//! Compile [`Filter`] expressions into parameterized SQL.
//!
//! Column names come from [`EventColumn`] and are the only text spliced into
//! the statement; every literal goes through [`QueryBuilder::push_bind`].
//! Extra-attribute conditions compile to an `EXISTS` sub-select so the
//! `events` rows are never multiplied by a join.

use sqlx::{QueryBuilder, Sqlite};
use tally_types::time::format_timestamp;
use tally_types::{EventColumn, Filter, FilterValue};

/// Append ` WHERE <filter>` when a filter is present.
pub(crate) fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, filter: Option<&Filter>) {
    if let Some(filter) = filter {
        qb.push(" WHERE ");
        push_filter(qb, filter);
    }
}

/// Append `filter` as a boolean SQL expression.
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    match filter {
        Filter::Compare { column, op, value } => {
            push_column(qb, *column);
            qb.push(" ").push(op.as_sql()).push(" ");
            push_value(qb, value);
        }
        Filter::IsNull(column) => {
            push_column(qb, *column);
            qb.push(" IS NULL");
        }
        Filter::IsNotNull(column) => {
            push_column(qb, *column);
            qb.push(" IS NOT NULL");
        }
        Filter::In { column, values } => {
            if values.is_empty() {
                qb.push("1 = 0");
                return;
            }
            push_column(qb, *column);
            qb.push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        Filter::Extra { key, value } => {
            qb.push(
                "EXISTS (SELECT 1 FROM events_extra \
                 WHERE events_extra.event_id = events.id AND events_extra.key = ",
            );
            qb.push_bind(key.clone());
            if let Some(value) = value {
                qb.push(" AND events_extra.value = ");
                qb.push_bind(value.clone());
            }
            qb.push(")");
        }
        Filter::And(parts) => push_junction(qb, parts, " AND ", "1 = 1"),
        Filter::Or(parts) => push_junction(qb, parts, " OR ", "1 = 0"),
        Filter::Not(inner) => {
            qb.push("NOT (");
            push_filter(qb, inner);
            qb.push(")");
        }
    }
}

fn push_junction(
    qb: &mut QueryBuilder<'_, Sqlite>,
    parts: &[Filter],
    separator: &str,
    identity: &str,
) {
    if parts.is_empty() {
        qb.push(identity);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        push_filter(qb, part);
    }
    qb.push(")");
}

fn push_column(qb: &mut QueryBuilder<'_, Sqlite>, column: EventColumn) {
    qb.push("events.").push(column.column_name());
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &FilterValue) {
    match value {
        FilterValue::Bool(b) => qb.push_bind(*b),
        FilterValue::Integer(i) => qb.push_bind(*i),
        FilterValue::Timestamp(ts) => qb.push_bind(format_timestamp(ts)),
        FilterValue::Text(s) => qb.push_bind(s.clone()),
    };
}
