// Randomised candle generator used when no live provider is wired in.
use async_trait::async_trait;
use chart_shared::{Candle, CandleSeries, Interval, SeriesError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

use super::CandleSource;
use crate::clock::Clock;
use crate::error::EngineError;

pub const DEFAULT_CANDLE_COUNT: usize = 100;
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(200);

/// Largest per-candle move as a fraction of price.
const MAX_MOVE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentProfile {
    pub base_price: f64,
    /// Upper bound of wick excursions is half of this.
    pub volatility: f64,
    pub volume_multiplier: f64,
}

impl InstrumentProfile {
    pub fn for_instrument(instrument: &str) -> Self {
        if instrument.to_uppercase().contains("BTC") {
            InstrumentProfile { base_price: 50_000.0, volatility: 200.0, volume_multiplier: 10.0 }
        } else {
            InstrumentProfile { base_price: 3_000.0, volatility: 20.0, volume_multiplier: 1.0 }
        }
    }
}

/// Generates `count` candles whose newest bucket starts at `now - interval`.
///
/// The walk runs newest-first: each candle closes where its successor opens, so once the
/// buffer is reversed `series[i].open == series[i - 1].close` holds exactly.
pub fn generate_candles<R: Rng + ?Sized>(
    instrument: &str,
    interval: Interval,
    count: usize,
    now: i64,
    rng: &mut R,
) -> Result<CandleSeries, SeriesError> {
    let profile = InstrumentProfile::for_instrument(instrument);
    let step = interval.seconds();
    let max_wick = profile.volatility * 0.5;

    let mut candles = Vec::with_capacity(count);
    let mut time = now;
    let mut next_open = profile.base_price;
    for _ in 0..count {
        time -= step;
        let change = (rng.gen::<f64>() - 0.5) * 2.0 * MAX_MOVE;
        let close = next_open;
        // close = open * (1 + change), solved for open
        let open = close / (1.0 + change);
        let high = open.max(close) + rng.gen::<f64>() * max_wick;
        let low = (open.min(close) - rng.gen::<f64>() * max_wick).max(0.0);
        let volume = (rng.gen::<f64>() * 1000.0 + 500.0).floor() * profile.volume_multiplier;

        candles.push(Candle { time, open, high, low, close, volume: Some(volume) });
        next_open = open;
    }

    candles.reverse();
    CandleSeries::try_from(candles)
}

pub struct SyntheticSource {
    clock: Arc<dyn Clock>,
    count: usize,
    latency: Duration,
    seed: Option<u64>,
}

impl SyntheticSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            count: DEFAULT_CANDLE_COUNT,
            latency: DEFAULT_LATENCY,
            seed: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Same seed, instrument and interval always give the same price path.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng_for(&self, instrument: &str, interval: Interval) -> StdRng {
        match self.seed {
            Some(seed) => {
                let salt = instrument
                    .bytes()
                    .fold(interval.seconds() as u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
                StdRng::seed_from_u64(seed ^ salt)
            }
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl CandleSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch(&self, instrument: &str, interval: Interval) -> Result<CandleSeries, EngineError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let now = self.clock.now().timestamp();
        let mut rng = self.rng_for(instrument, interval);
        let series = generate_candles(instrument, interval, self.count, now, &mut rng)?;
        tracing::debug!(instrument, %interval, count = series.len(), now, "Generated synthetic candles");
        Ok(series)
    }
}
