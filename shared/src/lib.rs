// Data types shared between the chart engine and whatever renders its output.
pub mod models;
pub mod series;
pub mod utils;

pub use models::{Candle, IndicatorPoint, IndicatorSeries, Interval, IntervalTier};
pub use series::{CandleSeries, SeriesError};
