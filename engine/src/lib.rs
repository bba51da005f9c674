// Chart engine library root: candle sources, the candle cache, indicators and the
// service facade consumed by the presentation layer.

pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod services;

pub use error::EngineError;
