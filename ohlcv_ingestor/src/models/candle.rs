//! Canonical in-memory representation of an OHLCV bar.
//!
//! Every retriever returns [`Candle`]s and the persistent store reads and
//! writes them, regardless of where the bar originally came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one symbol at one timestamp.
///
/// Within a timeframe, a candle is identified by `(symbol, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time (UTC).
    pub timestamp: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    /// Canonical symbol such as `ETH/BTC`.
    pub symbol: String,
}

impl Candle {
    /// Epoch milliseconds of the bar open, the key used by storage and exchanges.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    fn key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.symbol.as_str())
    }
}

/// Merges `incoming` into `base`.
///
/// The result is ascending by timestamp and holds one candle per
/// `(symbol, timestamp)`. When both sides carry the same key the row from
/// `base` is kept.
pub fn merge_candles(base: Vec<Candle>, incoming: Vec<Candle>) -> Vec<Candle> {
    let mut merged = base;
    merged.extend(incoming);
    // stable: base rows stay ahead of incoming rows with the same key
    merged.sort_by(|a, b| a.key().cmp(&b.key()));
    merged.dedup_by(|later, earlier| later.key() == earlier.key());
    merged
}

/// Sorts ascending and drops repeated `(symbol, timestamp)` keys, keeping the first.
pub fn sort_dedup(candles: Vec<Candle>) -> Vec<Candle> {
    merge_candles(candles, Vec::new())
}
