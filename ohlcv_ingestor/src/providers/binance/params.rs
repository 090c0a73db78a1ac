use snafu::ensure;

use crate::{
    models::timeframe::Timeframe,
    providers::{ProviderError, ValidationSnafu},
};

/// Intervals the klines endpoint serves, in canonical form.
const SUPPORTED_INTERVALS: [&str; 15] = [
    "1S", "1M", "3M", "5M", "15M", "30M", "1H", "2H", "4H", "6H", "8H", "12H", "1D", "3D", "7D",
];

/// Maps a timeframe to the vendor's `interval` code.
///
/// Binance spells minutes `m`, hours `h`, days `d` and weeks `w`, which is the
/// lowercased canonical name except for the week.
pub fn interval_code(timeframe: Timeframe) -> Result<String, ProviderError> {
    let canonical = timeframe.canonical_name();
    ensure!(
        SUPPORTED_INTERVALS.contains(&canonical.as_str()),
        ValidationSnafu {
            message: format!("Binance does not serve {canonical} klines"),
        }
    );
    Ok(match canonical.as_str() {
        "7D" => "1w".to_string(),
        _ => canonical.to_ascii_lowercase(),
    })
}

/// `ETH/BTC` becomes `ETHBTC`.
pub fn market_symbol(symbol: &str) -> Result<String, ProviderError> {
    let market: String = symbol
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_'))
        .collect::<String>()
        .to_ascii_uppercase();
    ensure!(
        !market.is_empty() && market.chars().all(|c| c.is_ascii_alphanumeric()),
        ValidationSnafu {
            message: format!("unsupported symbol {symbol:?}"),
        }
    );
    Ok(market)
}

/// Query string for one klines page.
pub fn construct_params(
    symbol: &str,
    timeframe: Timeframe,
    since_ms: i64,
    limit: usize,
) -> Result<Vec<(String, String)>, ProviderError> {
    Ok(vec![
        ("symbol".to_string(), market_symbol(symbol)?),
        ("interval".to_string(), interval_code(timeframe)?),
        ("startTime".to_string(), since_ms.to_string()),
        ("limit".to_string(), limit.to_string()),
    ])
}
