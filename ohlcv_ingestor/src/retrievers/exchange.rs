//! Paged, paced fetching from an [`ExchangeClient`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::DateTime;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, info, warn};

use crate::{
    models::{
        candle::{Candle, sort_dedup},
        date_range::DateRange,
        timeframe::Timeframe,
    },
    providers::{ExchangeClient, Kline},
    retrievers::{OhlcvRetriever, PartialReason, Retrieval, RetrievalStatus, RetrieveError},
};

pub const DEFAULT_MAX_CALLS: u32 = 1000;

/// Walks an exchange endpoint page by page until the requested range is covered.
///
/// Calls are spaced by a direct rate limiter built from the client's minimum
/// call interval. Provider errors never escape: they end the walk and are
/// reported as [`RetrievalStatus::Partial`] together with the rows already
/// fetched.
pub struct ExchangeRetriever {
    client: Arc<dyn ExchangeClient>,
    page_size: usize,
    max_calls: u32,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl ExchangeRetriever {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        let page_size = client.max_page_size().max(1);
        let limiter = build_limiter(client.min_call_interval());
        Self {
            client,
            page_size,
            max_calls: DEFAULT_MAX_CALLS,
            limiter,
        }
    }

    /// Rows requested per call, clamped to the client's maximum.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, self.client.max_page_size().max(1));
        self
    }

    pub fn with_max_calls(mut self, max_calls: u32) -> Self {
        self.max_calls = max_calls.max(1);
        self
    }

    /// Overrides the client's minimum call interval. Zero disables pacing.
    pub fn with_min_call_interval(mut self, interval: Duration) -> Self {
        self.limiter = build_limiter(interval);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

fn build_limiter(interval: Duration) -> Option<DefaultDirectRateLimiter> {
    Quota::with_period(interval).map(RateLimiter::direct)
}

fn to_candle(kline: &Kline, symbol: &str) -> Option<Candle> {
    Some(Candle {
        timestamp: DateTime::from_timestamp_millis(kline.open_time)?,
        open: kline.open,
        high: kline.high,
        low: kline.low,
        close: kline.close,
        volume: kline.volume,
        symbol: symbol.to_string(),
    })
}

#[async_trait]
impl OhlcvRetriever for ExchangeRetriever {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError> {
        let from_ms = range.start().timestamp_millis();
        let to_ms = range.end_inclusive().timestamp_millis();
        let tf_ms = timeframe.millis();
        let exchange = self.client.name();

        let mut cursor = from_ms;
        let mut calls: u32 = 0;
        let mut rows: Vec<Kline> = Vec::new();

        let status = loop {
            if calls >= self.max_calls {
                warn!(
                    %symbol, %timeframe, exchange, max_calls = self.max_calls, rows = rows.len(),
                    "call limit reached before range was covered"
                );
                break RetrievalStatus::Partial(PartialReason::CallLimitReached {
                    max_calls: self.max_calls,
                });
            }

            self.pace().await;
            calls += 1;

            let page = match self
                .client
                .fetch_ohlcv(symbol, timeframe, cursor, self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        %symbol, %timeframe, exchange, call = calls, rows = rows.len(), error = %e,
                        "exchange request failed, returning partial data"
                    );
                    break RetrievalStatus::Partial(PartialReason::ProviderFailed {
                        calls,
                        message: e.to_string(),
                    });
                }
            };

            let Some(last) = page.iter().map(|k| k.open_time).max() else {
                debug!(%symbol, %timeframe, call = calls, "empty page");
                break RetrievalStatus::Complete;
            };
            debug!(%symbol, %timeframe, call = calls, rows = page.len(), last, "page received");
            rows.extend(page);

            if last.saturating_add(tf_ms) >= to_ms {
                break RetrievalStatus::Complete;
            }
            let next = last.saturating_add(1);
            if next <= cursor {
                warn!(%symbol, %timeframe, exchange, cursor, "exchange cursor did not advance");
                break RetrievalStatus::Complete;
            }
            cursor = next;
        };

        let candles = sort_dedup(
            rows.iter()
                .filter(|k| k.open_time >= from_ms && k.open_time <= to_ms)
                .filter_map(|k| to_candle(k, symbol))
                .collect(),
        );
        info!(%symbol, %timeframe, exchange, calls, rows = candles.len(), %range, "exchange fetch finished");

        Ok(Retrieval { candles, status })
    }
}
