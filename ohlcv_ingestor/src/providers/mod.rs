//! Exchange abstraction for paginated OHLCV endpoints.
//!
//! This module defines the [`ExchangeClient`] trait, a thin wrapper over a
//! single vendor endpoint that returns one page of klines per call. Paging,
//! pacing and range clipping live in
//! [`ExchangeRetriever`](crate::retrievers::exchange::ExchangeRetriever), so a
//! client only has to know how to talk to its vendor.
//!
//! The trait supports dynamic dispatch (`Arc<dyn ExchangeClient>`) so the
//! client can be picked from configuration at runtime.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use ohlcv_ingestor::models::timeframe::Timeframe;
//! use ohlcv_ingestor::providers::{ExchangeClient, Kline, ProviderError};
//!
//! struct Silent;
//!
//! #[async_trait]
//! impl ExchangeClient for Silent {
//!     fn name(&self) -> &str { "silent" }
//!     fn min_call_interval(&self) -> Duration { Duration::ZERO }
//!     fn max_page_size(&self) -> usize { 500 }
//!     async fn fetch_ohlcv(
//!         &self,
//!         _symbol: &str,
//!         _timeframe: Timeframe,
//!         _since_ms: i64,
//!         _limit: usize,
//!     ) -> Result<Vec<Kline>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod binance;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::timeframe::Timeframe;

/// One exchange row: `[open_time_ms, open, high, low, close, volume]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A paginated, rate-limited OHLCV endpoint.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Minimum spacing between two calls the vendor tolerates.
    fn min_call_interval(&self) -> Duration;

    /// Largest page a single call may request.
    fn max_page_size(&self) -> usize;

    /// Fetches at most `limit` klines opening at or after `since_ms`, ascending.
    ///
    /// # Arguments
    ///
    /// * `symbol` - Canonical symbol such as `ETH/BTC`; the client maps it to
    ///   the vendor's spelling.
    /// * `timeframe` - Bar interval; unsupported intervals fail with
    ///   [`ProviderError::Validation`].
    /// * `since_ms` - Epoch milliseconds of the first bar wanted.
    /// * `limit` - Page size.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
        limit: usize,
    ) -> Result<Vec<Kline>, ProviderError>;
}

/// Errors that can occur during the creation of a client instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within an `ExchangeClient` call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// Network failure, timeout or an unreadable body.
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The exchange answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters are not supported by this exchange.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// A row in the response did not have the expected shape.
    #[snafu(display("Malformed response: {message}"))]
    Decode {
        message: String,
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedClient(Vec<Kline>);
    struct FailingClient;

    #[async_trait]
    impl ExchangeClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }
        fn min_call_interval(&self) -> Duration {
            Duration::ZERO
        }
        fn max_page_size(&self) -> usize {
            10
        }
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            since_ms: i64,
            limit: usize,
        ) -> Result<Vec<Kline>, ProviderError> {
            Ok(self
                .0
                .iter()
                .filter(|k| k.open_time >= since_ms)
                .take(limit)
                .copied()
                .collect())
        }
    }

    #[async_trait]
    impl ExchangeClient for FailingClient {
        fn name(&self) -> &str {
            "failing"
        }
        fn min_call_interval(&self) -> Duration {
            Duration::ZERO
        }
        fn max_page_size(&self) -> usize {
            10
        }
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _since_ms: i64,
            _limit: usize,
        ) -> Result<Vec<Kline>, ProviderError> {
            ApiSnafu {
                status: 418u16,
                message: "teapot",
            }
            .fail()
        }
    }

    // Picked at runtime, used through the trait object only.
    fn get_client(name: &str) -> Arc<dyn ExchangeClient> {
        if name == "failing" {
            Arc::new(FailingClient)
        } else {
            let k = |t| Kline { open_time: t, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 };
            Arc::new(FixedClient(vec![k(0), k(60_000), k(120_000)]))
        }
    }

    #[tokio::test]
    async fn test_dynamic_client() {
        let tf = Timeframe::parse("1m").unwrap();

        let client = get_client("fixed");
        let page = client.fetch_ohlcv("ETH/BTC", tf, 60_000, 10).await.unwrap();
        assert_eq!(page.len(), 2);

        let err = get_client("failing")
            .fetch_ohlcv("ETH/BTC", tf, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 418, .. }));
        assert_eq!(err.to_string(), "API error (418): teapot");
    }
}
