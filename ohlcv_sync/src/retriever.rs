//! Serves stored candles through the common retriever capability.

use std::sync::Arc;

use async_trait::async_trait;
use ohlcv_ingestor::{
    models::{date_range::DateRange, timeframe::Timeframe},
    retrievers::{OhlcvRetriever, Retrieval, RetrieveError},
};

use crate::store::{OhlcvStore, RangeFilter};

pub struct StoreRetriever {
    store: Arc<dyn OhlcvStore>,
}

impl StoreRetriever {
    pub fn new(store: Arc<dyn OhlcvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OhlcvRetriever for StoreRetriever {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError> {
        let filter = RangeFilter::for_range(symbol, &range);
        let candles = self
            .store
            .query(&filter, timeframe)
            .map_err(|e| RetrieveError::Storage(Box::new(e)))?;
        Ok(Retrieval::complete(candles))
    }
}
