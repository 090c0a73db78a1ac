use serde::Deserialize;
use serde_json::Value;

use crate::providers::{DecodeSnafu, Kline, ProviderError};

/// Error body returned with non-2xx statuses, e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Deserialize, Debug)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}

/// A raw kline row. Prices arrive as strings:
/// `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`.
pub type RawKline = Vec<Value>;

pub fn parse_kline(row: &[Value]) -> Result<Kline, ProviderError> {
    if row.len() < 6 {
        return DecodeSnafu {
            message: format!("kline row has {} fields, expected at least 6", row.len()),
        }
        .fail();
    }
    let open_time = row[0].as_i64().ok_or_else(|| {
        DecodeSnafu {
            message: format!("open time {} is not an integer", row[0]),
        }
        .build()
    })?;

    Ok(Kline {
        open_time,
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: number(&row[5], "volume")?,
    })
}

pub fn parse_klines(rows: &[RawKline]) -> Result<Vec<Kline>, ProviderError> {
    rows.iter().map(|row| parse_kline(row)).collect()
}

fn number(value: &Value, field: &str) -> Result<f64, ProviderError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DecodeSnafu {
            message: format!("{field} value {value} is not numeric"),
        }
        .build()
    })
}
