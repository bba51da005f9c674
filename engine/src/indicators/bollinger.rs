// Bollinger Bands indicator implementation
use super::sma::sma_values;
use super::{align, IndicatorCalculator, IndicatorLine};
use chart_shared::Candle;
use serde_json::Value;

pub struct BollingerBands {
    name: String,
    period: usize,
    deviation: f64,
}

impl BollingerBands {
    pub fn new(period: usize, deviation: f64) -> Self {
        Self {
            name: format!("BB({},{})", period, deviation),
            period,
            deviation,
        }
    }
}

impl IndicatorCalculator for BollingerBands {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period, "deviation": self.deviation })
    }

    /// Lines: Upper, Middle (SMA), Lower. Bands use the population standard deviation.
    fn calculate(&self, data: &[Candle]) -> Vec<IndicatorLine> {
        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        let middle = sma_values(&closes, self.period);

        let mut upper = Vec::with_capacity(closes.len());
        let mut lower = Vec::with_capacity(closes.len());
        for (i, mean) in middle.iter().enumerate() {
            match mean {
                Some(mean) => {
                    let window = &closes[i + 1 - self.period..=i];
                    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.period as f64;
                    let width = self.deviation * variance.sqrt();
                    upper.push(Some(mean + width));
                    lower.push(Some(mean - width));
                }
                None => {
                    upper.push(None);
                    lower.push(None);
                }
            }
        }

        vec![
            IndicatorLine { name: "Upper".to_string(), points: align(data, &upper) },
            IndicatorLine { name: "Middle".to_string(), points: align(data, &middle) },
            IndicatorLine { name: "Lower".to_string(), points: align(data, &lower) },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::series_from_closes;

    #[test]
    fn test_bollinger_bands() {
        // window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population std 2
        let series = series_from_closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let lines = BollingerBands::new(8, 2.0).calculate(&series);
        assert_eq!(lines[0].points.len(), 1);
        assert_eq!(lines[0].points[0].value, 9.0);
        assert_eq!(lines[1].points[0].value, 5.0);
        assert_eq!(lines[2].points[0].value, 1.0);
        assert_eq!(lines[1].points[0].time, 8);
    }

    #[test]
    fn test_bands_collapse_on_flat_prices() {
        let series = series_from_closes(&[3.0; 5]);
        let lines = BollingerBands::new(3, 2.0).calculate(&series);
        for line in &lines {
            assert_eq!(line.points.len(), 3);
            assert!(line.points.iter().all(|p| p.value == 3.0));
        }
    }

    #[test]
    fn test_bands_recover_after_price_spike() {
        let series = series_from_closes(&[1e17, 1.0, 1.0, 1.0]);
        let lines = BollingerBands::new(2, 2.0).calculate(&series);
        for line in &lines {
            assert_eq!(line.points[2].value, 1.0, "{}", line.name);
        }
    }
}
