// Simple Moving Average (SMA) indicator implementation
use super::{align, IndicatorCalculator, IndicatorLine};
use chart_shared::{Candle, IndicatorPoint, IndicatorSeries};
use serde_json::Value;

pub struct Sma {
    name: String,
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("SMA({})", period),
            period,
        }
    }
}

/// Mean close over each trailing window of `period` candles, stamped with the window's last time.
/// Empty when `period` is 0 or longer than the input.
pub fn moving_average(data: &[Candle], period: usize) -> IndicatorSeries {
    sma_values(&data.iter().map(|c| c.close).collect::<Vec<_>>(), period)
        .iter()
        .zip(data)
        .filter_map(|(v, c)| v.map(|value| IndicatorPoint { time: c.time, value }))
        .collect()
}

/// Per-input SMA with `None` where the window is not yet full.
pub(crate) fn sma_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < period {
        return vec![None; values.len()];
    }
    let mut results = vec![None; period - 1];
    // Each window is summed from scratch; a running sum drifts when magnitudes differ.
    results.extend(
        values
            .windows(period)
            .map(|window| Some(window.iter().sum::<f64>() / period as f64)),
    );
    results
}

impl IndicatorCalculator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period })
    }

    fn calculate(&self, data: &[Candle]) -> Vec<IndicatorLine> {
        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        vec![IndicatorLine {
            name: self.name.clone(),
            points: align(data, &sma_values(&closes, self.period)),
        }]
    }
}
