//! Time helpers for calendar events.
//!
//! [`EventTime`] models the two shapes an event boundary can take on the wire
//! (a timestamp or an all-day date), [`TimeBounds`] the optional
//! `timeMin`/`timeMax` pair sent with list queries. The free functions fix the
//! textual formats used when talking to the calendar API.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Date-only wire format for all-day events.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timezone written alongside every timestamp we send.
pub const WIRE_TIMEZONE: &str = "UTC";

/// A timestamp argument that is not valid RFC3339.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid timestamp '{input}' (expected RFC3339, e.g. 2024-01-15T10:00:00Z): {reason}")]
pub struct TimestampError {
    pub input: String,
    pub reason: String,
}

/// Start or end of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day date.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Resolves a wire pair, preferring the timestamp over the date.
    ///
    /// Unparseable or empty values yield `None`; callers treat that as "absent".
    pub fn from_wire(date_time: Option<&str>, date: Option<&str>) -> Option<Self> {
        match (non_empty(date_time), non_empty(date)) {
            (Some(dt), _) => parse_rfc3339(dt).map(Self::DateTime),
            (None, Some(d)) => NaiveDate::parse_from_str(d, DATE_FORMAT).ok().map(Self::AllDay),
            (None, None) => None,
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Instant used for ordering; all-day dates sit at midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// Optional lower/upper bounds on event start for a list query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    /// Inclusive lower bound (`timeMin`).
    pub min: Option<DateTime<Utc>>,
    /// Inclusive upper bound (`timeMax`).
    pub max: Option<DateTime<Utc>>,
}

impl TimeBounds {
    pub const NONE: Self = Self {
        min: None,
        max: None,
    };

    pub fn after(min: DateTime<Utc>) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn before(max: DateTime<Utc>) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Whether any bound is set. Ordering by start time is only requested when true.
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Whether `instant` satisfies both bounds.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.min.is_none_or(|min| instant >= min) && self.max.is_none_or(|max| instant <= max)
    }
}

/// Formats a timestamp the way the calendar API expects (`2024-01-15T10:00:00Z`).
pub fn format_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Lenient RFC3339 parse: `None` on failure.
pub fn parse_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Strict RFC3339 parse for user-supplied arguments.
pub fn parse_timestamp_arg(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TimestampError {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// The top of the hour following `now` (10:25:13 becomes 11:00:00).
pub fn top_of_next_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = now
        .with_nanosecond(0)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_minute(0))
        .unwrap_or(now);
    truncated + Duration::hours(1)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn wire_prefers_timestamp() {
        let et = EventTime::from_wire(Some("2024-01-15T10:00:00Z"), Some("2024-01-20")).unwrap();
        assert_eq!(et, EventTime::DateTime(utc(2024, 1, 15, 10, 0, 0)));
    }

    #[test]
    fn wire_falls_back_to_date() {
        let et = EventTime::from_wire(Some(""), Some("2024-01-20")).unwrap();
        assert!(et.is_all_day());
        assert_eq!(et.to_utc_datetime(), utc(2024, 1, 20, 0, 0, 0));
    }

    #[test]
    fn wire_garbage_is_absent() {
        assert_eq!(EventTime::from_wire(Some("yesterday"), None), None);
        assert_eq!(EventTime::from_wire(None, Some("20/01/2024")), None);
        assert_eq!(EventTime::from_wire(None, None), None);
    }

    #[test]
    fn wire_offset_is_normalised() {
        let et = EventTime::from_wire(Some("2024-01-15T12:00:00+02:00"), None).unwrap();
        assert_eq!(et.to_utc_datetime(), utc(2024, 1, 15, 10, 0, 0));
    }

    #[test]
    fn ordering_mixes_dates_and_timestamps() {
        let morning = EventTime::DateTime(utc(2024, 1, 15, 9, 0, 0));
        let all_day = EventTime::AllDay(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let earlier = EventTime::DateTime(utc(2024, 1, 14, 23, 0, 0));
        let mut times = vec![morning.clone(), all_day.clone(), earlier.clone()];
        times.sort();
        assert_eq!(times, vec![earlier, all_day, morning]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let bounds = TimeBounds {
            min: Some(utc(2024, 1, 15, 0, 0, 0)),
            max: Some(utc(2024, 1, 16, 0, 0, 0)),
        };
        assert!(bounds.is_active());
        assert!(bounds.contains(utc(2024, 1, 15, 0, 0, 0)));
        assert!(bounds.contains(utc(2024, 1, 15, 23, 59, 59)));
        assert!(bounds.contains(utc(2024, 1, 16, 0, 0, 0)));
        assert!(!bounds.contains(utc(2024, 1, 16, 0, 0, 1)));
        assert!(!bounds.contains(utc(2024, 1, 14, 23, 59, 59)));
        assert!(!TimeBounds::NONE.is_active());
        assert!(TimeBounds::NONE.contains(utc(1999, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn formats_with_z_suffix_and_no_fraction() {
        let dt = utc(2024, 1, 15, 10, 0, 0) + Duration::milliseconds(250);
        assert_eq!(format_rfc3339(dt), "2024-01-15T10:00:00Z");
    }

    #[test]
    fn next_hour_rounds_up() {
        let now = utc(2024, 1, 15, 10, 25, 13) + Duration::milliseconds(400);
        assert_eq!(top_of_next_hour(now), utc(2024, 1, 15, 11, 0, 0));
        assert_eq!(top_of_next_hour(utc(2024, 12, 31, 23, 0, 0)), utc(2025, 1, 1, 0, 0, 0));
    }

    #[test]
    fn strict_parse_reports_input() {
        assert_eq!(
            parse_timestamp_arg(" 2024-01-15T10:00:00Z ").unwrap(),
            utc(2024, 1, 15, 10, 0, 0)
        );
        let err = parse_timestamp_arg("tomorrow").unwrap_err();
        assert_eq!(err.input, "tomorrow");
        assert!(err.to_string().contains("RFC3339"));
    }
}
