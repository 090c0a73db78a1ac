//! Bar interval used to name storage partitions and to drive exchange paging.
//!
//! A [`Timeframe`] is a positive whole number of seconds. It is parsed from
//! short codes such as `15m`, `4h` or `1d` and always prints in a single
//! canonical form, so two spellings of the same interval (`24h`, `1d`) end up
//! in the same partition.

use std::{fmt, str::FromStr};

use chrono::TimeDelta;
use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Largest interval whose millisecond length still fits an `i64`.
const MAX_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Units used for canonical names, largest first.
const NAMING_UNITS: [(u64, char); 4] = [(DAY, 'D'), (HOUR, 'H'), (MINUTE, 'M'), (1, 'S')];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("Invalid timeframe {input:?}: {reason}")]
    InvalidTimeframe { input: String, reason: String },
}

impl TimeframeError {
    fn invalid(input: &str, reason: impl Into<String>) -> Self {
        TimeframeError::InvalidTimeframe {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A bar interval, stored as whole seconds.
///
/// Equality, hashing and ordering only look at the duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    seconds: u64,
}

impl Timeframe {
    /// Parses `<multiplier?><unit>` where the unit is one of `s m h d w`
    /// (any case) and the multiplier defaults to 1.
    ///
    /// ```
    /// use ohlcv_ingestor::models::timeframe::Timeframe;
    ///
    /// let tf = Timeframe::parse("4h").unwrap();
    /// assert_eq!(tf.seconds(), 14_400);
    /// assert_eq!(tf.canonical_name(), "4H");
    /// ```
    pub fn parse(input: &str) -> Result<Self, TimeframeError> {
        let text = input.trim();
        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeframeError::invalid(input, "missing unit"))?;
        let (digits, unit) = text.split_at(digits_end);

        let mut unit_chars = unit.chars();
        let unit_seconds = match (unit_chars.next(), unit_chars.next()) {
            (Some(c), None) => match c.to_ascii_lowercase() {
                's' => 1,
                'm' => MINUTE,
                'h' => HOUR,
                'd' => DAY,
                'w' => WEEK,
                other => {
                    return Err(TimeframeError::invalid(
                        input,
                        format!("unknown unit '{other}'"),
                    ));
                }
            },
            _ => return Err(TimeframeError::invalid(input, "expected a single unit letter")),
        };

        let multiplier = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u64>()
                .map_err(|_| TimeframeError::invalid(input, "multiplier out of range"))?
        };
        if multiplier == 0 {
            return Err(TimeframeError::invalid(input, "multiplier must be positive"));
        }

        let seconds = multiplier
            .checked_mul(unit_seconds)
            .ok_or_else(|| TimeframeError::invalid(input, "duration overflows"))?;
        Self::checked(seconds).map_err(|reason| TimeframeError::invalid(input, reason))
    }

    pub fn from_seconds(seconds: u64) -> Result<Self, TimeframeError> {
        Self::checked(seconds).map_err(|reason| TimeframeError::invalid(&format!("{seconds}s"), reason))
    }

    fn checked(seconds: u64) -> Result<Self, &'static str> {
        match seconds {
            0 => Err("duration must be positive"),
            s if s > MAX_SECONDS => Err("duration overflows"),
            s => Ok(Self { seconds: s }),
        }
    }

    /// The largest of D/H/M/S that divides the duration, e.g. `1D`, `90M`, `30S`.
    /// Weeks are written in days (`1w` is `7D`).
    pub fn canonical_name(&self) -> String {
        NAMING_UNITS
            .iter()
            .find(|(unit, _)| self.seconds % unit == 0)
            .map(|(unit, letter)| format!("{}{}", self.seconds / unit, letter))
            .unwrap_or_else(|| format!("{}S", self.seconds))
    }

    /// Name of the storage table holding bars of this interval.
    pub fn partition_name(&self) -> String {
        format!("TIMEFRAME_{}", self.canonical_name())
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn millis(&self) -> i64 {
        // bounded by MAX_SECONDS
        self.seconds as i64 * 1000
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.millis())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}
