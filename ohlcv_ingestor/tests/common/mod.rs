#![allow(dead_code)]

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use ohlcv_ingestor::{
    models::timeframe::Timeframe,
    providers::{ExchangeClient, Kline, ProviderError},
};

/// In-memory exchange serving evenly spaced bars and recording every call.
pub struct ScriptedExchange {
    pub first_ms: i64,
    pub step_ms: i64,
    pub count: i64,
    pub max_page: usize,
    calls: Mutex<Vec<(i64, usize)>>,
}

impl ScriptedExchange {
    pub fn new(first_ms: i64, step_ms: i64, count: i64) -> Self {
        Self {
            first_ms,
            step_ms,
            count,
            max_page: 500,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(i64, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    fn name(&self) -> &str {
        "scripted"
    }

    fn min_call_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn max_page_size(&self) -> usize {
        self.max_page
    }

    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        since_ms: i64,
        limit: usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        self.calls.lock().unwrap().push((since_ms, limit));
        Ok((0..self.count)
            .map(|i| self.first_ms + i * self.step_ms)
            .filter(|t| *t >= since_ms)
            .take(limit)
            .map(|t| Kline {
                open_time: t,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect())
    }
}
