//! Persistent OHLCV storage, one partition per timeframe.

pub mod sqlite;

use chrono::{DateTime, Utc};
use ohlcv_ingestor::models::{candle::Candle, date_range::DateRange, timeframe::Timeframe};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Rows of one symbol with `start <= timestamp < end_exclusive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end_exclusive: DateTime<Utc>,
}

impl RangeFilter {
    pub fn new(symbol: impl Into<String>, start: DateTime<Utc>, end_exclusive: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end_exclusive,
        }
    }

    /// Whole days of `range`, midnight of the first day up to midnight after the last.
    pub fn for_range(symbol: impl Into<String>, range: &DateRange) -> Self {
        Self::new(symbol, range.start(), range.end_exclusive())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot open database {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Query on {partition} failed: {source}")]
    Query {
        partition: String,
        #[source]
        source: diesel::result::Error,
    },

    #[error("Row for {symbol} at {timestamp} already exists in {partition}")]
    DuplicateRow {
        symbol: String,
        timestamp: DateTime<Utc>,
        partition: String,
    },

    #[error("Timestamp {value} in {partition} is not a valid epoch millisecond")]
    CorruptTimestamp { partition: String, value: i64 },
}

/// Append-only candle storage.
///
/// Writes are all-or-nothing per call: a batch that collides with an existing
/// `(symbol, timestamp)` is rejected as a whole with [`StoreError::DuplicateRow`].
pub trait OhlcvStore: Send + Sync {
    /// Inserts `candles` into the partition of `timeframe`, returning the row count.
    fn store(&self, candles: &[Candle], timeframe: Timeframe) -> Result<usize, StoreError>;

    /// Returns matching rows ascending by timestamp. A missing partition reads as empty.
    fn query(&self, filter: &RangeFilter, timeframe: Timeframe) -> Result<Vec<Candle>, StoreError>;
}
