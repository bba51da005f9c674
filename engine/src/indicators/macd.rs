// Moving Average Convergence Divergence (MACD) indicator implementation
use super::ema::ema_values;
use super::{align, IndicatorCalculator, IndicatorLine};
use chart_shared::Candle;
use serde_json::Value;

pub struct Macd {
    name: String,
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            name: format!("MACD({},{},{})", fast, slow, signal),
            fast,
            slow,
            signal,
        }
    }
}

impl IndicatorCalculator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "fast": self.fast, "slow": self.slow, "signal": self.signal })
    }

    /// Lines: MACD (fast EMA - slow EMA), Signal (EMA of MACD), Histogram (MACD - Signal).
    fn calculate(&self, data: &[Candle]) -> Vec<IndicatorLine> {
        let closes: Vec<f64> = data.iter().map(|c| c.close).collect();
        let fast = ema_values(&closes, self.fast);
        let slow = ema_values(&closes, self.slow);

        let macd: Vec<Option<f64>> = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) => Some(f - s),
                _ => None,
            })
            .collect();

        // The signal EMA runs over the defined part of the MACD line only.
        let offset = macd.iter().take_while(|v| v.is_none()).count();
        let defined: Vec<f64> = macd.iter().skip(offset).flatten().copied().collect();
        let mut signal = vec![None; offset];
        signal.extend(ema_values(&defined, self.signal));

        let histogram: Vec<Option<f64>> = macd
            .iter()
            .zip(&signal)
            .map(|(m, s)| match (m, s) {
                (Some(m), Some(s)) => Some(m - s),
                _ => None,
            })
            .collect();

        vec![
            IndicatorLine { name: "MACD".to_string(), points: align(data, &macd) },
            IndicatorLine { name: "Signal".to_string(), points: align(data, &signal) },
            IndicatorLine { name: "Histogram".to_string(), points: align(data, &histogram) },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::series_from_closes;

    #[test]
    fn test_macd_line_lengths() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = series_from_closes(&closes);
        let lines = Macd::new(12, 26, 9).calculate(&series);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].points.len(), 40 - 25);
        assert_eq!(lines[1].points.len(), 40 - 25 - 8);
        assert_eq!(lines[2].points.len(), lines[1].points.len());
        assert_eq!(lines[0].points[0].time, series[25].time);
        assert_eq!(lines[1].points[0].time, series[33].time);
    }

    #[test]
    fn test_macd_of_constant_series_is_zero() {
        let series = series_from_closes(&[50.0; 12]);
        let lines = Macd::new(2, 4, 3).calculate(&series);
        for line in &lines {
            assert!(!line.points.is_empty());
            assert!(line.points.iter().all(|p| p.value.abs() < 1e-12), "{}", line.name);
        }
    }

    #[test]
    fn test_histogram_is_macd_minus_signal() {
        let series = series_from_closes(&[1.0, 3.0, 2.0, 5.0, 4.0, 7.0, 6.0, 9.0, 8.0, 11.0]);
        let lines = Macd::new(2, 3, 2).calculate(&series);
        let (macd, signal, hist) = (&lines[0].points, &lines[1].points, &lines[2].points);
        for h in hist {
            let m = macd.iter().find(|p| p.time == h.time).unwrap();
            let s = signal.iter().find(|p| p.time == h.time).unwrap();
            assert!((h.value - (m.value - s.value)).abs() < 1e-12);
        }
    }
}
