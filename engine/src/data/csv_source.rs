// File-backed candle provider: one CSV per instrument and interval.
use async_trait::async_trait;
use chart_shared::utils::parse_time;
use chart_shared::{Candle, CandleSeries, Interval};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::CandleSource;
use crate::error::EngineError;

// CSV Header: time,open,high,low,close[,volume]
// Example Row: 2024-12-30T18:00:00Z,50010.5,50120.0,49980.0,50100.25,1234.5
#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<INSTRUMENT>_<interval>.csv`, e.g. `BTC-PERP_1h.csv`.
    pub fn path_for(&self, instrument: &str, interval: Interval) -> Result<PathBuf, EngineError> {
        if instrument.is_empty() || instrument.contains(|c: char| c == '/' || c == '\\') || instrument.contains("..") {
            return Err(EngineError::MarketDataError(format!("invalid instrument name '{}'", instrument)));
        }
        Ok(self.dir.join(format!("{}_{}.csv", instrument, interval)))
    }

    /// Parses candle rows, sorts them by time and keeps the last row of any duplicated bucket.
    pub fn parse_candles(bytes: &[u8]) -> Result<CandleSeries, EngineError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(bytes);

        let mut candles = Vec::new();
        for (idx, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let line = idx + 2;
            let row = result?;
            let time = parse_time(&row.time)
                .map_err(|e| EngineError::CsvDataFormatError(format!("Error parsing 'time' at line {}: {}", line, e)))?;
            let candle = Candle {
                time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            if !candle.is_well_formed() {
                return Err(EngineError::CsvDataFormatError(format!(
                    "Candle at line {} violates low <= open/close <= high",
                    line
                )));
            }
            candles.push(candle);
        }

        candles.sort_by_key(|c| c.time);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.time == candle.time => *last = candle,
                _ => deduped.push(candle),
            }
        }
        Ok(CandleSeries::try_from(deduped)?)
    }

    async fn read(&self, path: &Path, instrument: &str) -> Result<Vec<u8>, EngineError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::SourceUnavailable {
                source_name: self.name().to_string(),
                instrument: instrument.to_string(),
                reason: format!("no data file at {}", path.display()),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CandleSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch(&self, instrument: &str, interval: Interval) -> Result<CandleSeries, EngineError> {
        let path = self.path_for(instrument, interval)?;
        let bytes = self.read(&path, instrument).await?;
        let series = Self::parse_candles(&bytes)?;
        tracing::debug!(instrument, %interval, path = %path.display(), count = series.len(), "Loaded candles from CSV");
        Ok(series)
    }
}
