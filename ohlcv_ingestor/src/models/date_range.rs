//! Inclusive calendar-day ranges used by every fetch.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Malformed range: from {from} is after to {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },

    #[error("Invalid date {input:?}: expected YYYY-MM-DD, M-D-YYYY, M/D/YYYY or RFC 3339")]
    InvalidDate { input: String },
}

/// A range of whole UTC days, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, DateRangeError> {
        if from > to {
            return Err(DateRangeError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parses both ends with [`parse_date`] and validates their order.
    pub fn parse(from: &str, to: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    /// A single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Midnight (UTC) of the first day.
    pub fn start(&self) -> DateTime<Utc> {
        self.from.and_time(NaiveTime::MIN).and_utc()
    }

    /// Midnight (UTC) after the last day.
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        self.to.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1)
    }

    /// Last millisecond of the last day.
    pub fn end_inclusive(&self) -> DateTime<Utc> {
        self.end_exclusive() - TimeDelta::milliseconds(1)
    }

    /// Midnight (UTC) of the last day.
    pub fn last_day_start(&self) -> DateTime<Utc> {
        self.to.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start() && ts < self.end_exclusive()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Accepts `YYYY-MM-DD`, `M-D-YYYY`, `M/D/YYYY` and RFC 3339 timestamps.
/// A timestamp yields its UTC date.
pub fn parse_date(input: &str) -> Result<NaiveDate, DateRangeError> {
    let text = input.trim();
    ["%Y-%m-%d", "%m-%d-%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| DateRangeError::InvalidDate {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(date(2020, 12, 3), date(2020, 12, 1)).unwrap_err();
        assert!(matches!(err, DateRangeError::Inverted { .. }));
    }

    #[test]
    fn boundaries_cover_whole_days() {
        let range = DateRange::new(date(2020, 12, 1), date(2020, 12, 3)).unwrap();
        assert_eq!(range.start().timestamp_millis(), 1_606_780_800_000);
        assert_eq!(range.end_exclusive().timestamp_millis(), 1_607_040_000_000);
        assert_eq!(range.end_inclusive().timestamp_millis(), 1_607_039_999_999);
        assert!(range.contains(range.end_inclusive()));
        assert!(!range.contains(range.end_exclusive()));
    }

    #[test]
    fn offset_timestamps_use_the_utc_date() {
        assert_eq!(parse_date("2020-12-01T23:00:00-05:00").unwrap(), date(2020, 12, 2));
        assert_eq!(parse_date("2020-12-02T01:00:00+03:00").unwrap(), date(2020, 12, 1));
    }

    #[test]
    fn parses_supported_formats() {
        assert_eq!(parse_date("2020-12-01").unwrap(), date(2020, 12, 1));
        assert_eq!(parse_date("12-01-2020").unwrap(), date(2020, 12, 1));
        assert_eq!(parse_date("12/1/2020").unwrap(), date(2020, 12, 1));
        assert_eq!(parse_date("2020-12-01T10:00:00Z").unwrap(), date(2020, 12, 1));
        assert!(matches!(
            parse_date("yesterday"),
            Err(DateRangeError::InvalidDate { .. })
        ));
    }

    #[test]
    fn single_day_range_is_valid() {
        let range = DateRange::parse("2020-12-01", "2020-12-01").unwrap();
        assert_eq!(range, DateRange::day(date(2020, 12, 1)));
        assert_eq!(range.to_string(), "2020-12-01..=2020-12-01");
    }
}
