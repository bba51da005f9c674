use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::series::SeriesError;

/// One OHLCV bar. `time` is the Unix second at which the bucket starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    /// True when prices are finite, `low <= min(open, close)`, `high >= max(open, close)`
    /// and the volume, if present, is non-negative.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return false;
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return false;
        }
        self.volume.map_or(true, |v| v.is_finite() && v >= 0.0)
    }
}

/// Bucket duration of a candle series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

/// Coarse grouping of intervals by how fast their buckets change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalTier {
    Intraday,
    Hourly,
    Daily,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::Minute1,
        Interval::Minute5,
        Interval::Minute15,
        Interval::Hour1,
        Interval::Hour4,
        Interval::Day1,
        Interval::Week1,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            Interval::Minute1 => 60,
            Interval::Minute5 => 5 * 60,
            Interval::Minute15 => 15 * 60,
            Interval::Hour1 => 60 * 60,
            Interval::Hour4 => 4 * 60 * 60,
            Interval::Day1 => 24 * 60 * 60,
            Interval::Week1 => 7 * 24 * 60 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1w",
        }
    }

    /// Intervals fast enough that an open chart should poll for new data.
    pub fn is_live(self) -> bool {
        matches!(self, Interval::Minute1 | Interval::Minute5 | Interval::Minute15)
    }

    pub fn tier(self) -> IntervalTier {
        match self {
            Interval::Minute1 | Interval::Minute5 | Interval::Minute15 => IntervalTier::Intraday,
            Interval::Hour1 | Interval::Hour4 => IntervalTier::Hourly,
            Interval::Day1 | Interval::Week1 => IntervalTier::Daily,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SeriesError::UnknownInterval(s.to_string()))
    }
}

/// A single value of a derived series, aligned to the time of the candle it was computed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}

pub type IndicatorSeries = Vec<IndicatorPoint>;
