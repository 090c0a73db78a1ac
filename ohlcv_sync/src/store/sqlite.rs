use chrono::{DateTime, Utc};
use diesel::{
    Connection, QueryableByName, RunQueryDsl, SqliteConnection,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_query,
    sql_types::{BigInt, Double, Text},
};
use ohlcv_ingestor::models::{candle::Candle, timeframe::Timeframe};
use tracing::{debug, info};

use crate::{
    db::connection::connect_sqlite,
    store::{OhlcvStore, RangeFilter, StoreError},
};

#[derive(QueryableByName)]
struct CandleRow {
    #[diesel(sql_type = BigInt)]
    timestamp: i64,
    #[diesel(sql_type = Double)]
    open: f64,
    #[diesel(sql_type = Double)]
    high: f64,
    #[diesel(sql_type = Double)]
    low: f64,
    #[diesel(sql_type = Double)]
    close: f64,
    #[diesel(sql_type = Double)]
    volume: f64,
    #[diesel(sql_type = Text)]
    symbol: String,
}

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Errors raised inside the write transaction.
enum TxError {
    Diesel(DieselError),
    Duplicate { symbol: String, timestamp: DateTime<Utc> },
}

impl From<DieselError> for TxError {
    fn from(e: DieselError) -> Self {
        TxError::Diesel(e)
    }
}

/// SQLite-backed store. Every call opens its own connection and drops it
/// before returning.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database_url: String,
}

impl SqliteStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        connect_sqlite(&self.database_url).map_err(|e| StoreError::Connection {
            url: self.database_url.clone(),
            reason: format!("{e:#}"),
        })
    }

    /// Names of the existing `TIMEFRAME_*` partitions, sorted.
    pub fn partitions(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connect()?;
        let rows: Vec<TableName> = sql_query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'TIMEFRAME\\_%' ESCAPE '\\' ORDER BY name",
        )
        .load(&mut conn)
        .map_err(|source| StoreError::Query {
            partition: "sqlite_master".to_string(),
            source,
        })?;
        Ok(rows.into_iter().map(|t| t.name).collect())
    }

    /// Drops the partition of `timeframe`. Meant for test setup.
    pub fn drop_partition(&self, timeframe: Timeframe) -> Result<(), StoreError> {
        let partition = timeframe.partition_name();
        let mut conn = self.connect()?;
        sql_query(format!("DROP TABLE IF EXISTS {partition}"))
            .execute(&mut conn)
            .map_err(|source| StoreError::Query { partition, source })?;
        Ok(())
    }
}

/// Partition names are `TIMEFRAME_` followed by digits and one unit letter,
/// so they are safe to splice into SQL.
fn ensure_partition(conn: &mut SqliteConnection, partition: &str) -> Result<(), DieselError> {
    sql_query(format!(
        "CREATE TABLE IF NOT EXISTS {partition} (\
            Timestamp INTEGER NOT NULL, \
            Open REAL NOT NULL, \
            High REAL NOT NULL, \
            Low REAL NOT NULL, \
            Close REAL NOT NULL, \
            Volume REAL NOT NULL, \
            Symbol TEXT NOT NULL, \
            PRIMARY KEY (Symbol, Timestamp))"
    ))
    .execute(conn)?;
    Ok(())
}

fn is_unique_violation(e: &DieselError) -> bool {
    matches!(e, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

impl OhlcvStore for SqliteStore {
    fn store(&self, candles: &[Candle], timeframe: Timeframe) -> Result<usize, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }
        let partition = timeframe.partition_name();
        let mut conn = self.connect()?;
        let insert = format!(
            "INSERT INTO {partition} (Timestamp, Open, High, Low, Close, Volume, Symbol) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        );

        let result = conn.immediate_transaction::<_, TxError, _>(|conn| {
            ensure_partition(conn, &partition)?;
            for c in candles {
                sql_query(&insert)
                    .bind::<BigInt, _>(c.timestamp_millis())
                    .bind::<Double, _>(c.open)
                    .bind::<Double, _>(c.high)
                    .bind::<Double, _>(c.low)
                    .bind::<Double, _>(c.close)
                    .bind::<Double, _>(c.volume)
                    .bind::<Text, _>(&c.symbol)
                    .execute(conn)
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            TxError::Duplicate {
                                symbol: c.symbol.clone(),
                                timestamp: c.timestamp,
                            }
                        } else {
                            TxError::Diesel(e)
                        }
                    })?;
            }
            Ok(candles.len())
        });

        match result {
            Ok(rows) => {
                info!(%partition, rows, "candles stored");
                Ok(rows)
            }
            Err(TxError::Duplicate { symbol, timestamp }) => Err(StoreError::DuplicateRow {
                symbol,
                timestamp,
                partition,
            }),
            Err(TxError::Diesel(source)) => Err(StoreError::Query { partition, source }),
        }
    }

    fn query(&self, filter: &RangeFilter, timeframe: Timeframe) -> Result<Vec<Candle>, StoreError> {
        let partition = timeframe.partition_name();
        let mut conn = self.connect()?;
        ensure_partition(&mut conn, &partition).map_err(|source| StoreError::Query {
            partition: partition.clone(),
            source,
        })?;

        let rows: Vec<CandleRow> = sql_query(format!(
            "SELECT Timestamp AS timestamp, Open AS open, High AS high, Low AS low, \
             Close AS close, Volume AS volume, Symbol AS symbol \
             FROM {partition} \
             WHERE Symbol = ? AND Timestamp >= ? AND Timestamp < ? \
             ORDER BY Timestamp"
        ))
        .bind::<Text, _>(&filter.symbol)
        .bind::<BigInt, _>(filter.start.timestamp_millis())
        .bind::<BigInt, _>(filter.end_exclusive.timestamp_millis())
        .load(&mut conn)
        .map_err(|source| StoreError::Query {
            partition: partition.clone(),
            source,
        })?;

        debug!(%partition, symbol = %filter.symbol, rows = rows.len(), "partition queried");
        rows.into_iter()
            .map(|r| {
                let timestamp = DateTime::<Utc>::from_timestamp_millis(r.timestamp).ok_or_else(|| {
                    StoreError::CorruptTimestamp {
                        partition: partition.clone(),
                        value: r.timestamp,
                    }
                })?;
                Ok(Candle {
                    timestamp,
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                    symbol: r.symbol,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()
    }
}
