//! TOML configuration for the sync layer.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! database_url = "ohlcv_data/ohlcv_sqlite.db"
//! gap_boundary = "day"            # or "timeframe"
//!
//! [exchange]
//! base_url = "https://api.binance.com"
//! page_size = 500
//! max_calls = 1000
//! min_call_interval_ms = 1000
//! timeout_secs = 30
//! # api_key_env = "BINANCE_API_KEY"
//! ```
//!
//! `DATABASE_URL` in the environment overrides `database_url`, and
//! `OHLCV_MAX_CALLS` / `OHLCV_MIN_CALL_INTERVAL_MS` override the matching
//! `[exchange]` fields.

use std::{path::Path, time::Duration};

use anyhow::Context;
use ohlcv_ingestor::{
    providers::binance::{BinanceConfig, provider::DEFAULT_BASE_URL},
    retrievers::exchange::DEFAULT_MAX_CALLS,
};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_parsed, get_env_var_opt};
use tracing::debug;

use crate::puller::GapBoundary;

pub const DEFAULT_DATABASE_URL: &str = "ohlcv_data/ohlcv_sqlite.db";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const MAX_CALLS_ENV: &str = "OHLCV_MAX_CALLS";
pub const MIN_CALL_INTERVAL_ENV: &str = "OHLCV_MIN_CALL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// SQLite file holding the `TIMEFRAME_*` partitions.
    pub database_url: String,
    pub gap_boundary: GapBoundary,
    pub exchange: ExchangeConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gap_boundary: GapBoundary::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub page_size: usize,
    pub max_calls: u32,
    pub min_call_interval_ms: u64,
    pub timeout_secs: u64,
    /// Environment variable to read an API key from.
    pub api_key_env: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 500,
            max_calls: DEFAULT_MAX_CALLS,
            min_call_interval_ms: 1000,
            timeout_secs: 30,
            api_key_env: None,
        }
    }
}

impl ExchangeConfig {
    pub fn binance_config(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            min_call_interval: Duration::from_millis(self.min_call_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

impl SyncConfig {
    /// Parses a TOML document. Environment overrides are not applied.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("parsing sync config")
    }

    /// Reads and parses a TOML file. Environment overrides are not applied.
    pub fn load_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// File (or defaults) plus environment overrides; what the CLI uses.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => Self::load_path(p)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Fails when a numeric override is set but does not parse.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Some(url) = get_env_var_opt(DATABASE_URL_ENV) {
            debug!(%url, "database_url overridden from environment");
            self.database_url = url;
        }
        if let Some(max_calls) = get_env_parsed::<u32>(MAX_CALLS_ENV)? {
            debug!(max_calls, "max_calls overridden from environment");
            self.exchange.max_calls = max_calls;
        }
        if let Some(ms) = get_env_parsed::<u64>(MIN_CALL_INTERVAL_ENV)? {
            debug!(ms, "min_call_interval_ms overridden from environment");
            self.exchange.min_call_interval_ms = ms;
        }
        Ok(self)
    }
}
