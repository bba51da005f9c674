// Candle providers and the cache that fronts them.
pub mod cache;
pub mod csv_source;
pub mod source;
pub mod synthetic;

pub use cache::{CandleCache, CandleLoad, LoadOrigin};
pub use csv_source::CsvSource;
pub use source::{source_from_settings, CandleSource};
pub use synthetic::{generate_candles, InstrumentProfile, SyntheticSource};
