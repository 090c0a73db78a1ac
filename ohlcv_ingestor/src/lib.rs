//! OHLCV data model and the sources bars can be retrieved from.
//!
//! - [`models`]: candles, timeframes and date ranges.
//! - [`providers`]: exchange clients (Binance klines).
//! - [`retrievers`]: the [`OhlcvRetriever`](retrievers::OhlcvRetriever)
//!   capability and its exchange, CSV and Kraken-archive implementations.

pub mod models;
pub mod providers;
pub mod retrievers;
