pub mod settings;

pub use settings::{CachePolicy, ChartSettings};
