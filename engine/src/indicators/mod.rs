// Technical indicators module
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::BollingerBands;
pub use ema::Ema;
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::{moving_average, Sma};

use chart_shared::{Candle, CandleSeries, IndicatorPoint, IndicatorSeries};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// One named line of an indicator overlay, e.g. the signal line of a MACD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorLine {
    pub name: String,
    pub points: IndicatorSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorOutput {
    pub name: String,
    pub lines: Vec<IndicatorLine>,
}

impl IndicatorOutput {
    pub fn empty(name: String) -> Self {
        Self { name, lines: Vec::new() }
    }

    /// The first line, or an empty slice when nothing could be computed.
    pub fn primary(&self) -> &[IndicatorPoint] {
        self.lines.first().map(|l| l.points.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.points.is_empty())
    }
}

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value;
    /// Pure function of the candles. Leading points where the indicator is undefined are omitted.
    fn calculate(&self, data: &[Candle]) -> Vec<IndicatorLine>;
}

/// Indicator selection with its typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IndicatorKind {
    #[serde(rename = "MA")]
    MovingAverage {
        #[serde(default = "default_period")]
        period: usize,
    },
    #[serde(rename = "EMA")]
    ExponentialMovingAverage {
        #[serde(default = "default_period")]
        period: usize,
    },
    #[serde(rename = "MACD")]
    Macd {
        #[serde(default = "default_macd_fast")]
        fast: usize,
        #[serde(default = "default_macd_slow")]
        slow: usize,
        #[serde(default = "default_macd_signal")]
        signal: usize,
    },
    #[serde(rename = "RSI")]
    Rsi {
        #[serde(default = "default_rsi_period")]
        period: usize,
    },
    #[serde(rename = "BB")]
    BollingerBands {
        #[serde(default = "default_period")]
        period: usize,
        #[serde(default = "default_deviation")]
        deviation: f64,
    },
}

fn default_period() -> usize {
    20
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_rsi_period() -> usize {
    14
}
fn default_deviation() -> f64 {
    2.0
}

impl IndicatorKind {
    /// Builds a kind from a toolbar label (`MA`, `EMA`, `MACD`, `RSI`, `BB`) and a loose JSON
    /// settings object. Missing keys take the toolbar defaults.
    pub fn from_params(kind: &str, params: &Value) -> Result<Self, EngineError> {
        let mut tagged = match params {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(EngineError::InvalidParameter(format!(
                    "parameters for '{}' must be an object, got {}",
                    kind, other
                )))
            }
        };
        tagged.insert("type".to_string(), Value::String(kind.trim().to_uppercase()));
        serde_json::from_value(Value::Object(tagged))
            .map_err(|e| EngineError::InvalidParameter(format!("indicator '{}': {}", kind, e)))
    }

    pub fn calculator(&self) -> Box<dyn IndicatorCalculator> {
        match *self {
            IndicatorKind::MovingAverage { period } => Box::new(Sma::new(period)),
            IndicatorKind::ExponentialMovingAverage { period } => Box::new(Ema::new(period)),
            IndicatorKind::Macd { fast, slow, signal } => Box::new(Macd::new(fast, slow, signal)),
            IndicatorKind::Rsi { period } => Box::new(Rsi::new(period)),
            IndicatorKind::BollingerBands { period, deviation } => {
                Box::new(BollingerBands::new(period, deviation))
            }
        }
    }

    /// Smallest series length for which the indicator yields at least one point.
    pub fn min_len(&self) -> usize {
        match *self {
            IndicatorKind::MovingAverage { period }
            | IndicatorKind::ExponentialMovingAverage { period }
            | IndicatorKind::BollingerBands { period, .. } => period,
            IndicatorKind::Rsi { period } => period + 1,
            IndicatorKind::Macd { slow, signal, .. } => slow + signal.saturating_sub(1),
        }
    }

    pub fn validate(&self, series_len: usize) -> Result<(), EngineError> {
        let periods: &[usize] = match self {
            IndicatorKind::MovingAverage { period }
            | IndicatorKind::ExponentialMovingAverage { period }
            | IndicatorKind::Rsi { period } => std::slice::from_ref(period),
            IndicatorKind::BollingerBands { period, deviation } => {
                if !deviation.is_finite() || *deviation <= 0.0 {
                    return Err(EngineError::InvalidParameter(format!(
                        "Bollinger deviation must be positive, got {}",
                        deviation
                    )));
                }
                std::slice::from_ref(period)
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                if fast >= slow {
                    return Err(EngineError::InvalidParameter(format!(
                        "MACD fast period ({}) must be shorter than slow period ({})",
                        fast, slow
                    )));
                }
                if *fast == 0 || *signal == 0 {
                    return Err(EngineError::InvalidParameter("MACD periods must be greater than 0".to_string()));
                }
                std::slice::from_ref(slow)
            }
        };
        if periods.iter().any(|&p| p == 0) {
            return Err(EngineError::InvalidParameter("Indicator period cannot be 0".to_string()));
        }
        if self.min_len() > series_len {
            return Err(EngineError::InvalidParameter(format!(
                "indicator needs at least {} candles, series has {}",
                self.min_len(),
                series_len
            )));
        }
        Ok(())
    }
}

pub fn try_compute_indicator(series: &CandleSeries, kind: &IndicatorKind) -> Result<IndicatorOutput, EngineError> {
    kind.validate(series.len())?;
    let calculator = kind.calculator();
    Ok(IndicatorOutput {
        name: calculator.name().to_string(),
        lines: calculator.calculate(series.as_slice()),
    })
}

/// Degrades to an empty output on bad parameters so a misconfigured overlay draws nothing.
pub fn compute_indicator(series: &CandleSeries, kind: &IndicatorKind) -> IndicatorOutput {
    match try_compute_indicator(series, kind) {
        Ok(output) => output,
        Err(e) => {
            let calculator = kind.calculator();
            tracing::warn!(
                indicator = %calculator.name(),
                parameters = %calculator.parameters(),
                candles = series.len(),
                error = %e,
                "Indicator not computed"
            );
            IndicatorOutput::empty(calculator.name().to_string())
        }
    }
}

/// Pairs per-candle values with candle times, dropping undefined entries.
pub(crate) fn align(data: &[Candle], values: &[Option<f64>]) -> IndicatorSeries {
    data.iter()
        .zip(values)
        .filter_map(|(c, v)| v.map(|value| IndicatorPoint { time: c.time, value }))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::series_from_closes;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_params_maps_toolbar_settings() {
        let kind = IndicatorKind::from_params("MA", &json!({ "period": 5 })).unwrap();
        assert_eq!(kind, IndicatorKind::MovingAverage { period: 5 });
        let kind = IndicatorKind::from_params("macd", &json!({ "fast": 3 })).unwrap();
        assert_eq!(kind, IndicatorKind::Macd { fast: 3, slow: 26, signal: 9 });
        let kind = IndicatorKind::from_params("BB", &Value::Null).unwrap();
        assert_eq!(kind, IndicatorKind::BollingerBands { period: 20, deviation: 2.0 });
    }

    #[test]
    fn test_from_params_rejects_unknown_kind_and_bad_values() {
        assert!(matches!(
            IndicatorKind::from_params("VWAP", &json!({})),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(IndicatorKind::from_params("MA", &json!({ "period": -3 })).is_err());
        assert!(IndicatorKind::from_params("MA", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_compute_dispatches_by_kind() {
        let series = series_from_closes(&[10.0, 20.0, 30.0]);
        let out = compute_indicator(&series, &IndicatorKind::MovingAverage { period: 2 });
        assert_eq!(out.name, "SMA(2)");
        assert_eq!(
            out.primary(),
            &[IndicatorPoint { time: 2, value: 15.0 }, IndicatorPoint { time: 3, value: 25.0 }]
        );
    }

    #[test]
    fn test_invalid_parameters_degrade_to_empty() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let cases = [
            IndicatorKind::MovingAverage { period: 0 },
            IndicatorKind::MovingAverage { period: 4 },
            IndicatorKind::Rsi { period: 3 },
            IndicatorKind::Macd { fast: 5, slow: 2, signal: 1 },
            IndicatorKind::BollingerBands { period: 2, deviation: -1.0 },
        ];
        for kind in cases {
            assert!(matches!(try_compute_indicator(&series, &kind), Err(EngineError::InvalidParameter(_))));
            assert!(compute_indicator(&series, &kind).is_empty());
        }
    }

    #[test]
    fn test_compute_is_idempotent() {
        let series = series_from_closes(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
        let kind = IndicatorKind::BollingerBands { period: 3, deviation: 2.0 };
        assert_eq!(compute_indicator(&series, &kind), compute_indicator(&series, &kind));
    }

    #[test]
    fn test_settings_json_round_trips_through_kind() {
        let kind: IndicatorKind = serde_json::from_value(json!({ "type": "RSI" })).unwrap();
        assert_eq!(kind, IndicatorKind::Rsi { period: 14 });
    }
}
