use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::timeframe::Timeframe,
    providers::{
        ApiSnafu, ClientBuildSnafu, ExchangeClient, InvalidApiKeySnafu, Kline, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu,
        binance::{
            params::construct_params,
            response::{BinanceErrorBody, RawKline, parse_klines},
        },
    },
};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
/// Hard cap of the klines endpoint.
pub const MAX_LIMIT: usize = 1000;

/// Connection settings for [`BinanceClient`].
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub page_size: usize,
    pub min_call_interval: Duration,
    pub timeout: Duration,
    /// Name of the environment variable holding an API key, if any.
    pub api_key_env: Option<String>,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 500,
            min_call_interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
            api_key_env: None,
        }
    }
}

pub struct BinanceClient {
    client: Client,
    base_url: String,
    page_size: usize,
    min_call_interval: Duration,
    _api_key: Option<SecretString>,
}

impl BinanceClient {
    /// Creates a client with the public endpoint and default pacing.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(BinanceConfig::default())
    }

    /// Creates a client from explicit settings.
    ///
    /// When `api_key_env` is set the key is read from that environment
    /// variable and sent as `X-MBX-APIKEY`; a missing variable is an error.
    pub fn with_config(config: BinanceConfig) -> Result<Self, ProviderInitError> {
        let api_key = match &config.api_key_env {
            Some(name) => Some(SecretString::new(
                get_env_var(name).context(MissingEnvVarSnafu)?.into(),
            )),
            None => None,
        };

        let mut headers = header::HeaderMap::new();
        if let Some(key) = &api_key {
            headers.insert(
                "X-MBX-APIKEY",
                header::HeaderValue::from_str(key.expose_secret()).context(InvalidApiKeySnafu)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, MAX_LIMIT),
            min_call_interval: config.min_call_interval,
            _api_key: api_key,
        })
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn min_call_interval(&self) -> Duration {
        self.min_call_interval
    }

    fn max_page_size(&self) -> usize {
        self.page_size
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
        limit: usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        let query = construct_params(symbol, timeframe, since_ms, limit.clamp(1, MAX_LIMIT))?;
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        debug!(%symbol, %timeframe, since_ms, limit, "requesting klines");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            let message = serde_json::from_str::<BinanceErrorBody>(&body)
                .map(|e| format!("{} (code {})", e.msg, e.code))
                .unwrap_or(body);
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        let rows = response
            .json::<Vec<RawKline>>()
            .await
            .context(ReqwestSnafu)?;
        parse_klines(&rows)
    }
}
