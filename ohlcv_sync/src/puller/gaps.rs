//! Locating the missing prefix and suffix of a requested range.
//!
//! The working set is whatever the store already holds for the request. A
//! gap is only looked for at the two ends; holes in the middle of stored data
//! are not detected.

use chrono::{DateTime, Utc};
use ohlcv_ingestor::models::{candle::Candle, date_range::DateRange, timeframe::Timeframe};
use serde::{Deserialize, Serialize};

/// Which bar must be present at each end for that end to count as covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapBoundary {
    /// Midnight of the first and of the last requested day.
    #[default]
    Day,
    /// First bar at or after midnight of the first day and last bar at or
    /// before the end of the last day, aligned to the timeframe.
    Timeframe,
}

impl GapBoundary {
    /// Timestamps of the bars that mark both ends as covered.
    pub fn bounds(self, range: &DateRange, timeframe: Timeframe) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            GapBoundary::Day => (range.start(), range.last_day_start()),
            GapBoundary::Timeframe => {
                let step = timeframe.millis();
                let start = range.start().timestamp_millis();
                let end = range.end_inclusive().timestamp_millis();
                let first = start
                    .checked_add(step - 1)
                    .and_then(|s| s.div_euclid(step).checked_mul(step));
                let last = end.div_euclid(step).checked_mul(step);
                let inside = |ms: &i64| (start..=end).contains(ms);
                (
                    millis_to_utc(first.filter(inside), range.start()),
                    millis_to_utc(last.filter(inside), range.last_day_start()),
                )
            }
        }
    }
}

/// Bars that overflow or land outside the range fall back to the day bound.
fn millis_to_utc(ms: Option<i64>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    ms.and_then(DateTime::from_timestamp_millis).unwrap_or(fallback)
}

fn has_bar_at(candles: &[Candle], ts: DateTime<Utc>) -> bool {
    candles.binary_search_by(|c| c.timestamp.cmp(&ts)).is_ok()
}

/// The missing prefix, `[from, date(earliest - timeframe)]`, or the whole
/// range when nothing is stored.
///
/// `candles` must be ascending.
pub fn prior_gap(
    candles: &[Candle],
    range: &DateRange,
    timeframe: Timeframe,
    from_boundary: DateTime<Utc>,
) -> Option<DateRange> {
    let Some(earliest) = candles.first() else {
        return Some(*range);
    };
    if has_bar_at(candles, from_boundary) {
        return None;
    }
    let upper = earliest.timestamp.checked_sub_signed(timeframe.duration())?.date_naive();
    DateRange::new(range.from(), upper.min(range.to())).ok()
}

/// The missing suffix, `[date(latest + timeframe), to]`. An empty working set
/// has no suffix gap; the prefix fill already covered it.
///
/// `candles` must be ascending.
pub fn post_gap(
    candles: &[Candle],
    range: &DateRange,
    timeframe: Timeframe,
    to_boundary: DateTime<Utc>,
) -> Option<DateRange> {
    let latest = candles.last()?;
    if has_bar_at(candles, to_boundary) {
        return None;
    }
    let lower = latest.timestamp.checked_add_signed(timeframe.duration())?.date_naive();
    DateRange::new(lower.max(range.from()), range.to()).ok()
}
