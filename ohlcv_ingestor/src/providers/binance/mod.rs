//! Binance spot klines (`GET /api/v3/klines`).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{BinanceClient, BinanceConfig};
