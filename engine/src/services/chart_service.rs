// Facade the presentation layer talks to: candles in, overlays out.
use chart_shared::{Candle, CandleSeries, Interval};
use std::sync::Arc;
use std::time::Duration;

use super::refresh::{self, ChartSubscription};
use crate::clock::Clock;
use crate::config::ChartSettings;
use crate::data::{source_from_settings, CandleCache, CandleLoad, CandleSource};
use crate::error::EngineError;
use crate::indicators::{self, IndicatorKind, IndicatorOutput};

#[derive(Clone)]
pub struct ChartService {
    cache: CandleCache,
    refresh_period: Duration,
}

impl ChartService {
    pub fn new(cache: CandleCache, refresh_period: Duration) -> Self {
        ChartService { cache, refresh_period }
    }

    pub fn from_settings(settings: &ChartSettings, clock: Arc<dyn Clock>) -> Self {
        let source: Arc<dyn CandleSource> = source_from_settings(settings, clock.clone());
        let cache = CandleCache::new(source, settings.cache, clock);
        Self::new(cache, settings.refresh_period())
    }

    pub fn cache(&self) -> &CandleCache {
        &self.cache
    }

    /// Suspends while a fetch is outstanding; never fails (see [`CandleLoad::error`]).
    pub async fn get_candles(&self, instrument: &str, interval: Interval) -> CandleLoad {
        tracing::info!(instrument, %interval, "Received candle request");
        self.cache.load(instrument, interval).await
    }

    /// Same as [`get_candles`](Self::get_candles) with the interval given as a label such as `"4h"`.
    pub async fn get_candles_for_label(&self, instrument: &str, interval: &str) -> Result<CandleLoad, EngineError> {
        let interval: Interval = interval.parse()?;
        Ok(self.get_candles(instrument, interval).await)
    }

    pub fn compute_indicator(&self, series: &CandleSeries, kind: &IndicatorKind) -> IndicatorOutput {
        indicators::compute_indicator(series, kind)
    }

    /// Accepts the toolbar's kind label and a JSON settings object, e.g. `("MACD", r#"{"fast":8}"#)`.
    /// Unparseable settings produce an empty overlay.
    pub fn compute_indicator_from_params(&self, series: &CandleSeries, kind: &str, parameters: &str) -> IndicatorOutput {
        let parsed = serde_json::from_str::<serde_json::Value>(parameters)
            .map_err(|e| EngineError::InvalidParameter(format!("Invalid JSON parameters for indicator '{}': {}", kind, e)))
            .and_then(|params| IndicatorKind::from_params(kind, &params));
        match parsed {
            Ok(kind) => self.compute_indicator(series, &kind),
            Err(e) => {
                tracing::error!(indicator_type = %kind, parameters = %parameters, error = %e, "Rejected indicator request");
                IndicatorOutput::empty(kind.to_string())
            }
        }
    }

    pub fn subscribe(&self, instrument: &str, interval: Interval) -> ChartSubscription {
        tracing::info!(instrument, %interval, live = interval.is_live(), "Opening chart subscription");
        refresh::subscribe(self.cache.clone(), instrument.to_string(), interval, self.refresh_period)
    }

    pub async fn merge_candle(
        &self,
        instrument: &str,
        interval: Interval,
        candle: Candle,
    ) -> Result<Arc<CandleSeries>, EngineError> {
        self.cache.merge_candle(instrument, interval, candle).await
    }

    pub async fn invalidate(&self, instrument: &str, interval: Interval) {
        self.cache.invalidate(instrument, interval).await
    }
}
