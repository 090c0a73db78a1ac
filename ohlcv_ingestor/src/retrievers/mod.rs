//! Sources that answer "give me the bars for this symbol, interval and range".
//!
//! Every source (exchange, flat file, zip archive, the local store) implements
//! [`OhlcvRetriever`], so the sync layer can compose them without knowing
//! which one it is talking to.

pub mod archive;
pub mod exchange;
pub mod file;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{candle::Candle, date_range::DateRange, timeframe::Timeframe};

/// Read-only access to OHLCV bars.
///
/// Implementations return rows ascending by timestamp, restricted to
/// `[range.start(), range.end_inclusive()]`. No data is an empty
/// [`RetrievalStatus::Complete`] retrieval, not an error.
#[async_trait]
pub trait OhlcvRetriever: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Retrieval, RetrieveError>;
}

/// Rows returned by a retriever together with how the fetch ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub candles: Vec<Candle>,
    pub status: RetrievalStatus,
}

impl Retrieval {
    pub fn complete(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            status: RetrievalStatus::Complete,
        }
    }

    pub fn partial(candles: Vec<Candle>, reason: PartialReason) -> Self {
        Self {
            candles,
            status: RetrievalStatus::Partial(reason),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, RetrievalStatus::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStatus {
    Complete,
    Partial(PartialReason),
}

/// Why a retrieval stopped before covering the requested range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialReason {
    /// The exchange returned an error after `calls` requests.
    ProviderFailed { calls: u32, message: String },
    /// The per-fetch call budget ran out.
    CallLimitReached { max_calls: u32 },
}

impl std::fmt::Display for PartialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartialReason::ProviderFailed { calls, message } => {
                write!(f, "provider failed on call {calls}: {message}")
            }
            PartialReason::CallLimitReached { max_calls } => {
                write!(f, "call limit of {max_calls} reached")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Source unavailable: {}", path.display())]
    SourceUnavailable { path: PathBuf },

    #[error("Entry {entry} not found in archive {}", archive.display())]
    ArchiveEntryMissing { archive: PathBuf, entry: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Storage read failed: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}
