//! Cache-aware fetching: answer from the store first, then fetch and persist
//! only the missing prefix and suffix of the request.
//!
//! A pull walks `CHECK_STORED -> FILL_PRIOR_GAP -> FILL_POST_GAP -> DONE`:
//!
//! 1. The stored retriever returns what is already cached.
//! 2. If the first boundary bar is missing, the range up to one bar before
//!    the earliest cached row is fetched online.
//! 3. If the last boundary bar is missing, the range from one bar after the
//!    latest row is fetched online.
//! 4. Every fetched row that is not already known is written to the store
//!    before the pull returns.

pub mod gaps;

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{Days, NaiveDate, Utc};
use ohlcv_ingestor::{
    models::{
        candle::{Candle, merge_candles, sort_dedup},
        date_range::{DateRange, DateRangeError, parse_date},
        timeframe::{Timeframe, TimeframeError},
    },
    providers::{ProviderInitError, binance::BinanceClient},
    retrievers::{OhlcvRetriever, RetrievalStatus, RetrieveError, exchange::ExchangeRetriever},
};
use thiserror::Error;
use tracing::{info, warn};

pub use gaps::GapBoundary;

use crate::{
    config::SyncConfig,
    retriever::StoreRetriever,
    store::{OhlcvStore, SqliteStore, StoreError},
};

#[derive(Debug, Error)]
pub enum PullError {
    #[error(transparent)]
    Timeframe(#[from] TimeframeError),

    #[error(transparent)]
    InvalidDate(DateRangeError),

    #[error(transparent)]
    MalformedRange(DateRangeError),

    #[error("Retrieval failed: {0}")]
    Retrieve(#[from] RetrieveError),
}

impl From<DateRangeError> for PullError {
    fn from(e: DateRangeError) -> Self {
        match e {
            DateRangeError::Inverted { .. } => PullError::MalformedRange(e),
            DateRangeError::InvalidDate { .. } => PullError::InvalidDate(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapSide {
    Prior,
    Post,
}

/// What happened to one gap during a pull.
#[derive(Debug, Clone, PartialEq)]
pub struct GapFill {
    pub side: GapSide,
    pub range: DateRange,
    /// New rows, after dropping those already known.
    pub fetched: usize,
    /// Whether every new row is now in the store.
    pub persisted: bool,
    /// `None` when no online retriever was configured.
    pub status: Option<RetrievalStatus>,
}

impl GapFill {
    pub fn is_complete(&self) -> bool {
        self.persisted && matches!(self.status, Some(RetrievalStatus::Complete))
    }
}

/// Result of a pull: the merged rows plus one entry per gap that was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Pull {
    pub candles: Vec<Candle>,
    pub fills: Vec<GapFill>,
}

impl Pull {
    /// True when every gap was fetched completely and persisted.
    pub fn is_complete(&self) -> bool {
        self.fills.iter().all(GapFill::is_complete)
    }
}

/// Orchestrates the stored and online retrievers around a store.
///
/// Every part is optional: without a stored retriever nothing counts as
/// cached, without an online retriever gaps stay unfilled, and without a store
/// fetched rows are returned but not kept.
#[derive(Default)]
pub struct DataPuller {
    stored: Option<Arc<dyn OhlcvRetriever>>,
    online: Option<Arc<dyn OhlcvRetriever>>,
    store: Option<Arc<dyn OhlcvStore>>,
    boundary: GapBoundary,
}

impl DataPuller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored(mut self, retriever: Arc<dyn OhlcvRetriever>) -> Self {
        self.stored = Some(retriever);
        self
    }

    pub fn with_online(mut self, retriever: Arc<dyn OhlcvRetriever>) -> Self {
        self.online = Some(retriever);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn OhlcvStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_boundary(mut self, boundary: GapBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Store-backed puller: a SQLite store at `database_url` serves as both
    /// the cache and the write target.
    pub fn with_sqlite(self, database_url: &str) -> Self {
        let store: Arc<dyn OhlcvStore> = Arc::new(SqliteStore::new(database_url));
        self.with_stored(Arc::new(StoreRetriever::new(store.clone())))
            .with_store(store)
    }

    /// SQLite cache in front of the Binance klines endpoint.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ProviderInitError> {
        let exchange = &config.exchange;
        let client = BinanceClient::with_config(exchange.binance_config())?;
        let online = ExchangeRetriever::new(Arc::new(client))
            .with_page_size(exchange.page_size)
            .with_max_calls(exchange.max_calls)
            .with_min_call_interval(Duration::from_millis(exchange.min_call_interval_ms));

        Ok(Self::new()
            .with_sqlite(&config.database_url)
            .with_online(Arc::new(online))
            .with_boundary(config.gap_boundary))
    }

    /// Parses the request and runs [`DataPuller::fetch_range`].
    ///
    /// `to` defaults to yesterday (UTC). Bad input fails before any I/O.
    pub async fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        from: &str,
        to: Option<&str>,
    ) -> Result<Pull, PullError> {
        let timeframe = Timeframe::parse(timeframe)?;
        let from = parse_date(from)?;
        let to = match to {
            Some(text) => parse_date(text)?,
            None => yesterday(),
        };
        let range = DateRange::new(from, to)?;
        self.fetch_range(symbol, timeframe, range).await
    }

    pub async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Pull, PullError> {
        let mut working = match &self.stored {
            Some(stored) => sort_dedup(stored.fetch_ohlcv(symbol, timeframe, range).await?.candles),
            None => Vec::new(),
        };
        let cached = working.len();
        let (from_boundary, to_boundary) = self.boundary.bounds(&range, timeframe);
        let mut fills = Vec::new();

        if let Some(gap) = gaps::prior_gap(&working, &range, timeframe, from_boundary) {
            fills.push(self.fill_gap(symbol, timeframe, GapSide::Prior, gap, &mut working).await?);
        }
        if let Some(gap) = gaps::post_gap(&working, &range, timeframe, to_boundary) {
            fills.push(self.fill_gap(symbol, timeframe, GapSide::Post, gap, &mut working).await?);
        }

        info!(
            %symbol, %timeframe, %range, cached, rows = working.len(), gaps = fills.len(),
            "pull finished"
        );
        Ok(Pull {
            candles: working,
            fills,
        })
    }

    async fn fill_gap(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        side: GapSide,
        gap: DateRange,
        working: &mut Vec<Candle>,
    ) -> Result<GapFill, PullError> {
        let Some(online) = &self.online else {
            info!(%symbol, %timeframe, ?side, %gap, "no online retriever, gap left open");
            return Ok(GapFill {
                side,
                range: gap,
                fetched: 0,
                persisted: false,
                status: None,
            });
        };

        let retrieval = online.fetch_ohlcv(symbol, timeframe, gap).await?;
        if let RetrievalStatus::Partial(reason) = &retrieval.status {
            warn!(%symbol, %timeframe, ?side, %gap, %reason, "gap only partially fetched");
        }

        let known: HashSet<i64> = working.iter().map(Candle::timestamp_millis).collect();
        let fresh: Vec<Candle> = sort_dedup(
            retrieval
                .candles
                .into_iter()
                .filter(|c| c.symbol == symbol && !known.contains(&c.timestamp_millis()))
                .collect(),
        );

        let persisted = self.persist(&fresh, timeframe);
        let fetched = fresh.len();
        info!(%symbol, %timeframe, ?side, %gap, rows = fetched, persisted, "gap filled");

        *working = merge_candles(std::mem::take(working), fresh);
        Ok(GapFill {
            side,
            range: gap,
            fetched,
            persisted,
            status: Some(retrieval.status),
        })
    }

    /// Writes `fresh` to the store. Failures are logged, never raised.
    fn persist(&self, fresh: &[Candle], timeframe: Timeframe) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        if fresh.is_empty() {
            return true;
        }
        match store.store(fresh, timeframe) {
            Ok(_) => true,
            Err(StoreError::DuplicateRow {
                symbol,
                timestamp,
                partition,
            }) => {
                warn!(
                    %symbol, %timestamp, %partition,
                    "row appeared in the store during the pull, batch not written"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, %timeframe, "failed to persist fetched rows");
                false
            }
        }
    }
}

fn yesterday() -> NaiveDate {
    let today = Utc::now().date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}
