// Engine settings, loaded from a JSON file or the embedded defaults.
use chart_shared::Interval;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::indicators::IndicatorKind;

const MAX_CANDLE_COUNT: usize = 10_000;
const MAX_REFRESH_PERIOD_SECS: u64 = 86_400;
const MAX_SIMULATED_LATENCY_MS: u64 = 60_000;
/// Largest age `chrono::Duration` can hold, which counts milliseconds in an i64.
const MAX_CACHE_SECS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartSettings {
    pub instruments: Vec<String>,
    pub interval: Interval,
    pub candle_count: usize,
    pub simulated_latency_ms: u64,
    /// Fixes the synthetic generator's RNG. Unset means fresh entropy per fetch.
    pub seed: Option<u64>,
    pub refresh_period_secs: u64,
    /// How long the demo binary keeps a live subscription open. 0 disables it.
    pub watch_secs: u64,
    pub cache: CachePolicy,
    /// When set, candles are read from `<dir>/<INSTRUMENT>_<interval>.csv` instead of generated.
    pub csv_data_dir: Option<PathBuf>,
    pub indicators: Vec<IndicatorKind>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        ChartSettings {
            instruments: vec!["BTC-PERP".to_string(), "ETH-PERP".to_string()],
            interval: Interval::Hour1,
            candle_count: 100,
            simulated_latency_ms: 200,
            seed: None,
            refresh_period_secs: 30,
            watch_secs: 0,
            cache: CachePolicy::default(),
            csv_data_dir: None,
            indicators: vec![IndicatorKind::MovingAverage { period: 20 }],
        }
    }
}

impl ChartSettings {
    pub fn load_default() -> Result<Self, EngineError> {
        let raw = include_str!("../../assets/config/default.json");
        Self::from_json(raw)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let settings: ChartSettings = serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigError(format!("invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.refresh_period_secs == 0 || self.refresh_period_secs > MAX_REFRESH_PERIOD_SECS {
            return Err(EngineError::ConfigError(format!(
                "refresh_period_secs must be between 1 and {}",
                MAX_REFRESH_PERIOD_SECS
            )));
        }
        if self.candle_count > MAX_CANDLE_COUNT {
            return Err(EngineError::ConfigError(format!(
                "candle_count must be at most {}",
                MAX_CANDLE_COUNT
            )));
        }
        if self.simulated_latency_ms > MAX_SIMULATED_LATENCY_MS {
            return Err(EngineError::ConfigError(format!(
                "simulated_latency_ms must be at most {}",
                MAX_SIMULATED_LATENCY_MS
            )));
        }
        if self.instruments.iter().any(|i| i.trim().is_empty()) {
            return Err(EngineError::ConfigError("instrument names cannot be empty".to_string()));
        }
        self.cache.validate()
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs)
    }
}

/// Maximum age of a cache entry per interval tier, in seconds.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CachePolicy {
    pub intraday_secs: u64,
    pub hourly_secs: u64,
    pub daily_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            intraday_secs: 60,
            hourly_secs: 300,
            daily_secs: 3600,
        }
    }
}

impl CachePolicy {
    fn validate(&self) -> Result<(), EngineError> {
        for (name, secs) in [
            ("intraday_secs", self.intraday_secs),
            ("hourly_secs", self.hourly_secs),
            ("daily_secs", self.daily_secs),
        ] {
            if secs > MAX_CACHE_SECS {
                return Err(EngineError::ConfigError(format!(
                    "cache.{} must be at most {}",
                    name, MAX_CACHE_SECS
                )));
            }
        }
        Ok(())
    }

    /// Ages too large for `chrono::Duration` saturate, so such entries never expire.
    pub fn duration_for(&self, interval: Interval) -> chrono::Duration {
        use chart_shared::IntervalTier;
        let secs = match interval.tier() {
            IntervalTier::Intraday => self.intraday_secs,
            IntervalTier::Hourly => self.hourly_secs,
            IntervalTier::Daily => self.daily_secs,
        };
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
