//! Timestamp layout shared by storage, filters, and date grouping.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS[.fff]` text in UTC. Whole
//! seconds render exactly like `SQLite`'s `CURRENT_TIMESTAMP`; a fractional
//! part is appended only when present. Keeping one layout means string
//! comparison in SQL agrees with chronological order, and `date()` still
//! reads every value.

use chrono::{NaiveDateTime, SubsecRound, Utc};

/// `strftime` layout for persisted timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Render a timestamp in the persisted layout.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn format_matches_sqlite_layout() {
        let ts = NaiveDate::from_ymd_opt(2017, 6, 1)
            .and_then(|d| d.and_hms_opt(19, 30, 27))
            .unwrap_or_default();
        assert_eq!(format_timestamp(&ts), "2017-06-01 19:30:27");
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let ts = NaiveDate::from_ymd_opt(2020, 2, 29)
            .and_then(|d| d.and_hms_milli_opt(12, 0, 1, 750))
            .unwrap_or_default();
        assert_eq!(format_timestamp(&ts), "2020-02-29 12:00:01.750");
    }

    #[test]
    fn fractions_sort_between_whole_seconds() {
        let at = |milli| {
            NaiveDate::from_ymd_opt(2020, 2, 29)
                .and_then(|d| d.and_hms_milli_opt(12, 0, 1, milli))
                .map(|ts| format_timestamp(&ts))
                .unwrap_or_default()
        };
        let next = NaiveDate::from_ymd_opt(2020, 2, 29)
            .and_then(|d| d.and_hms_opt(12, 0, 2))
            .map(|ts| format_timestamp(&ts))
            .unwrap_or_default();
        assert!(at(0) < at(200));
        assert!(at(200) < at(750));
        assert!(at(750) < next);
    }

    #[test]
    fn now_has_no_subseconds() {
        assert_eq!(now().and_utc().timestamp_subsec_nanos(), 0);
    }
}
