use chart_shared::SeriesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error("Candle source '{source_name}' unavailable for {instrument}: {reason}")]
    SourceUnavailable {
        source_name: String,
        instrument: String,
        reason: String,
    },

    #[error("Invalid indicator parameter: {0}")]
    InvalidParameter(String),

    #[error("Candle series error: {0}")]
    SeriesError(#[from] SeriesError),

    #[error("Market data error: {0}")]
    MarketDataError(String),
}

impl EngineError {
    /// Whether a retry could plausibly succeed. The presentation layer uses this to decide
    /// between a retry affordance and a plain error message.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::SourceUnavailable { .. } | EngineError::IoError { .. })
    }
}
