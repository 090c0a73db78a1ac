//! Kraken's downloadable OHLCVT history: a zip with one headerless CSV per
//! pair and interval, named `<PAIR>_<minutes>.csv`.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::DateTime;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;
use zip::{ZipArchive, result::ZipError};

use crate::{
    models::{
        candle::{Candle, sort_dedup},
        date_range::DateRange,
        timeframe::Timeframe,
    },
    retrievers::{OhlcvRetriever, Retrieval, RetrieveError, file::ensure_exists},
};

#[derive(Debug, Clone)]
pub struct KrakenArchiveRetriever {
    path: PathBuf,
}

impl KrakenArchiveRetriever {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RetrieveError> {
        let path = path.into();
        ensure_exists(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Vec<Candle>, RetrieveError> {
        ensure_exists(&self.path)?;
        let entry = entry_name(symbol, timeframe);
        let missing = || RetrieveError::ArchiveEntryMissing {
            archive: self.path.clone(),
            entry: entry.clone(),
        };
        // sub-minute intervals are never published
        if timeframe.seconds() % 60 != 0 {
            return Err(missing());
        }

        let mut archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        let file = match archive.by_name(&entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(missing()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut candles = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let candle = parse_record(&record, symbol)
                .map_err(|reason| RetrieveError::MalformedRow { line, reason })?;
            if range.contains(candle.timestamp) {
                candles.push(candle);
            }
        }
        Ok(sort_dedup(candles))
    }
}

/// `ETH/BTC` at one hour is `ETHBTC_60.csv`.
pub fn entry_name(symbol: &str, timeframe: Timeframe) -> String {
    format!("{}_{}.csv", symbol.replace('/', ""), timeframe.seconds() / 60)
}

fn parse_record(record: &StringRecord, symbol: &str) -> Result<Candle, String> {
    if record.len() < 6 {
        return Err(format!("expected at least 6 columns, found {}", record.len()));
    }
    let field = |i: usize, name: &str| -> Result<f64, String> {
        record[i]
            .parse::<f64>()
            .map_err(|_| format!("{name} value {:?} is not numeric", &record[i]))
    };

    let secs = record[0]
        .parse::<i64>()
        .ok()
        .or_else(|| record[0].parse::<f64>().ok().map(|s| s as i64))
        .ok_or_else(|| format!("time value {:?} is not numeric", &record[0]))?;
    let timestamp = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| format!("time value {secs} is out of range"))?;

    Ok(Candle {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
        symbol: symbol.to_string(),
    })
}

#[async_trait]
impl OhlcvRetriever for KrakenArchiveRetriever {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError> {
        let candles = self.read(symbol, timeframe, range)?;
        debug!(
            archive = %self.path.display(),
            entry = %entry_name(symbol, timeframe),
            rows = candles.len(),
            "archive rows read"
        );
        Ok(Retrieval::complete(candles))
    }
}
