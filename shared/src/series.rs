use serde::{Serialize, Serializer};
use std::ops::Deref;
use thiserror::Error;

use crate::models::Candle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("candle at {time} is not after the previous candle at {previous}")]
    OutOfOrder { time: i64, previous: i64 },

    #[error("candle at {time} violates the OHLC invariant")]
    MalformedCandle { time: i64 },

    #[error("unknown interval '{0}'")]
    UnknownInterval(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTime(String),
}

/// Candles ordered strictly by increasing `time`, oldest first.
///
/// The only ways to build one are [`CandleSeries::new`] and `TryFrom<Vec<Candle>>`,
/// both of which uphold the ordering. Consumers get read-only access through `Deref`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries(Vec<Candle>);

impl CandleSeries {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.0
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|c| c.close).collect()
    }

    /// Returns a new series with `candle` merged in. A candle for the same bucket as the
    /// last one replaces it; a later one is appended. Earlier elements are never touched.
    pub fn append_or_update(&self, candle: Candle) -> Result<CandleSeries, SeriesError> {
        if !candle.is_well_formed() {
            return Err(SeriesError::MalformedCandle { time: candle.time });
        }
        let mut candles = self.0.clone();
        match candles.last_mut() {
            Some(last) if last.time == candle.time => *last = candle,
            Some(last) if last.time > candle.time => {
                return Err(SeriesError::OutOfOrder {
                    time: candle.time,
                    previous: last.time,
                });
            }
            _ => candles.push(candle),
        }
        Ok(CandleSeries(candles))
    }
}

impl Deref for CandleSeries {
    type Target = [Candle];

    fn deref(&self) -> &[Candle] {
        &self.0
    }
}

impl TryFrom<Vec<Candle>> for CandleSeries {
    type Error = SeriesError;

    fn try_from(candles: Vec<Candle>) -> Result<Self, Self::Error> {
        for pair in candles.windows(2) {
            if pair[1].time <= pair[0].time {
                return Err(SeriesError::OutOfOrder {
                    time: pair[1].time,
                    previous: pair[0].time,
                });
            }
        }
        Ok(CandleSeries(candles))
    }
}

impl Serialize for CandleSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
