//! Local OHLCV cache kept in sync with a remote exchange.
//!
//! - [`store`]: SQLite persistence, one table per timeframe.
//! - [`retriever`]: the store exposed as an
//!   [`OhlcvRetriever`](ohlcv_ingestor::retrievers::OhlcvRetriever).
//! - [`puller`]: gap detection and the [`DataPuller`](puller::DataPuller).
//! - [`config`]: TOML settings.

pub mod config;
pub mod db;
pub mod puller;
pub mod retriever;
pub mod store;
