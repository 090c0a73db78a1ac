//! Flat CSV exports with one row per bar.
//!
//! The file has a header row `Timestamp,Open,High,Low,Close,Volume,Symbol`
//! and may mix several symbols.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    models::{
        candle::{Candle, sort_dedup},
        date_range::DateRange,
        timeframe::Timeframe,
    },
    retrievers::{OhlcvRetriever, Retrieval, RetrieveError},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize, Serialize)]
struct CsvRow {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
    #[serde(rename = "Symbol")]
    symbol: String,
}

/// Reads bars from a CSV export. The file is re-read on every fetch.
#[derive(Debug, Clone)]
pub struct CsvRetriever {
    path: PathBuf,
}

impl CsvRetriever {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RetrieveError> {
        let path = path.into();
        ensure_exists(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, symbol: &str, range: DateRange) -> Result<Vec<Candle>, RetrieveError> {
        ensure_exists(&self.path)?;
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(File::open(&self.path)?);
        let headers = reader.headers()?.clone();

        let mut candles = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let row: CsvRow = record.deserialize(Some(&headers))?;
            if row.symbol != symbol {
                continue;
            }
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                RetrieveError::MalformedRow {
                    line,
                    reason: format!("unrecognised timestamp {:?}", row.timestamp),
                }
            })?;
            if !range.contains(timestamp) {
                continue;
            }
            candles.push(Candle {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                symbol: row.symbol,
            });
        }
        Ok(sort_dedup(candles))
    }
}

pub(crate) fn ensure_exists(path: &Path) -> Result<(), RetrieveError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RetrieveError::SourceUnavailable {
            path: path.to_path_buf(),
        })
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (UTC), RFC 3339 and epoch seconds.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    text.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl OhlcvRetriever for CsvRetriever {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError> {
        let candles = self.read(symbol, range)?;
        debug!(path = %self.path.display(), %symbol, %timeframe, rows = candles.len(), "csv rows read");
        Ok(Retrieval::complete(candles))
    }
}

/// Writes candles in the same layout [`CsvRetriever`] reads.
pub fn write_csv<W: Write>(writer: W, candles: &[Candle]) -> Result<(), RetrieveError> {
    let mut out = WriterBuilder::new().from_writer(writer);
    for c in candles {
        out.serialize(CsvRow {
            timestamp: c.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            symbol: c.symbol.clone(),
        })?;
    }
    out.flush()?;
    Ok(())
}
