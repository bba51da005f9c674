// Exponential Moving Average (EMA) indicator implementation
use super::{align, IndicatorCalculator, IndicatorLine};
use chart_shared::Candle;
use serde_json::Value;

pub struct Ema {
    name: String,
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("EMA({})", period),
            period,
        }
    }
}

/// EMA seeded with the SMA of the first `period` values. `None` before the seed.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < period {
        return vec![None; values.len()];
    }

    let mut results = vec![None; period - 1];
    let multiplier = 2.0 / (period as f64 + 1.0);

    let initial_sum: f64 = values.iter().take(period).sum();
    let mut previous_ema = initial_sum / period as f64;
    results.push(Some(previous_ema));

    for value in values.iter().skip(period) {
        let ema = (value - previous_ema) * multiplier + previous_ema;
        results.push(Some(ema));
        previous_ema = ema;
    }
    results
}

impl IndicatorCalculator for Ema {
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
            points: align(data, &ema_values(&closes, self.period)),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::series_from_closes;

    #[test]
    fn test_ema_calculation() {
        let series = series_from_closes(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let lines = Ema::new(3).calculate(&series);
        let points = &lines[0].points;
        // SMA seed (10+11+12)/3 = 11, then (13-11)*0.5+11 = 12, (14-12)*0.5+12 = 13
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].time, 3);
        assert_eq!(points[0].value, 11.0);
        assert_eq!(points[1].value, 12.0);
        assert_eq!(points[2].value, 13.0);
    }

    #[test]
    fn test_ema_insufficient_data() {
        assert_eq!(ema_values(&[1.0, 2.0], 3), vec![None, None]);
        assert_eq!(ema_values(&[1.0], 0), vec![None]);
    }
}
