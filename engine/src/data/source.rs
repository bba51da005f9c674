use async_trait::async_trait;
use chart_shared::{CandleSeries, Interval};
use std::sync::Arc;

use super::{CsvSource, SyntheticSource};
use crate::clock::Clock;
use crate::config::ChartSettings;
use crate::error::EngineError;

/// Produces a chronological candle series for an instrument and interval.
#[async_trait]
pub trait CandleSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, instrument: &str, interval: Interval) -> Result<CandleSeries, EngineError>;
}

/// The CSV provider when a data directory is configured, the synthetic generator otherwise.
pub fn source_from_settings(settings: &ChartSettings, clock: Arc<dyn Clock>) -> Arc<dyn CandleSource> {
    match &settings.csv_data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using CSV candle source");
            Arc::new(CsvSource::new(dir.clone()))
        }
        None => {
            tracing::info!(
                count = settings.candle_count,
                latency_ms = settings.simulated_latency_ms,
                seeded = settings.seed.is_some(),
                "No live provider configured, using synthetic candles"
            );
            let mut source = SyntheticSource::new(clock)
                .with_count(settings.candle_count)
                .with_latency(settings.simulated_latency());
            if let Some(seed) = settings.seed {
                source = source.with_seed(seed);
            }
            Arc::new(source)
        }
    }
}
