#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ohlcv_ingestor::{
    models::{candle::Candle, date_range::DateRange, timeframe::Timeframe},
    retrievers::{OhlcvRetriever, PartialReason, Retrieval, RetrieveError},
};
use ohlcv_sync::{
    puller::DataPuller,
    retriever::StoreRetriever,
    store::{OhlcvStore, SqliteStore},
};
use tempfile::TempDir;

pub const SYMBOL: &str = "ETH/BTC";

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub url: String,
    pub store: Arc<SqliteStore>,
}

pub fn setup_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let url = dir.path().join("ohlcv_sqlite.db").to_string_lossy().to_string();
    let store = Arc::new(SqliteStore::new(url.clone()));
    TestDb {
        _dir: dir,
        url,
        store,
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(from: u32, to: u32) -> DateRange {
    DateRange::new(day(2020, 12, from), day(2020, 12, to)).unwrap()
}

pub fn tf(code: &str) -> Timeframe {
    Timeframe::parse(code).unwrap()
}

pub fn candle_at(ts: DateTime<Utc>) -> Candle {
    let x = (ts.timestamp() / 3600) as f64;
    Candle {
        timestamp: ts,
        open: x,
        high: x + 1.0,
        low: x - 1.0,
        close: x + 0.5,
        volume: 10.0,
        symbol: SYMBOL.to_string(),
    }
}

/// Every bar of `timeframe` opening inside `range`.
pub fn bars(range: DateRange, timeframe: Timeframe) -> Vec<Candle> {
    let step = timeframe.millis();
    let start = range.start().timestamp_millis();
    let first = (start + step - 1).div_euclid(step) * step;
    (0..)
        .map(|i| first + i * step)
        .take_while(|ms| *ms < range.end_exclusive().timestamp_millis())
        .map(|ms| candle_at(Utc.timestamp_millis_opt(ms).unwrap()))
        .collect()
}

/// What a [`ScriptedRetriever`] does when called.
#[derive(Clone)]
pub enum Script {
    /// Serve every bar of the requested range that lies inside `available`.
    Serve { available: DateRange },
    /// Serve like `Serve`, but cut off after `limit` rows and report a provider failure.
    Partial { available: DateRange, limit: usize },
    /// Fail as an unreadable source.
    Fail,
}

/// Online stand-in that records every range it is asked for.
pub struct ScriptedRetriever {
    script: Script,
    calls: Mutex<Vec<DateRange>>,
}

impl ScriptedRetriever {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn serving(available: DateRange) -> Arc<Self> {
        Self::new(Script::Serve { available })
    }

    pub fn calls(&self) -> Vec<DateRange> {
        self.calls.lock().unwrap().clone()
    }
}

fn clip(range: DateRange, available: DateRange, timeframe: Timeframe) -> Vec<Candle> {
    bars(range, timeframe)
        .into_iter()
        .filter(|c| available.contains(c.timestamp))
        .collect()
}

#[async_trait]
impl OhlcvRetriever for ScriptedRetriever {
    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError> {
        self.calls.lock().unwrap().push(range);
        match &self.script {
            Script::Serve { available } => Ok(Retrieval::complete(clip(range, *available, timeframe))),
            Script::Partial { available, limit } => {
                let mut rows = clip(range, *available, timeframe);
                rows.truncate(*limit);
                Ok(Retrieval::partial(
                    rows,
                    PartialReason::ProviderFailed {
                        calls: 2,
                        message: "HTTP 503".to_string(),
                    },
                ))
            }
            Script::Fail => Err(RetrieveError::SourceUnavailable {
                path: "scripted.zip".into(),
            }),
        }
    }
}

/// Puller over the SQLite store in `db`, fetching gaps from `online`.
pub fn puller(db: &TestDb, online: Arc<ScriptedRetriever>) -> DataPuller {
    let store: Arc<dyn OhlcvStore> = db.store.clone();
    DataPuller::new()
        .with_stored(Arc::new(StoreRetriever::new(store.clone())))
        .with_store(store)
        .with_online(online)
}

pub fn seed(db: &TestDb, range: DateRange, timeframe: Timeframe) -> Vec<Candle> {
    let rows = bars(range, timeframe);
    db.store.store(&rows, timeframe).unwrap();
    rows
}
