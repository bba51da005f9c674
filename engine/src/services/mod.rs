// Entry points used by the presentation layer.
pub mod chart_service;
pub mod refresh;

pub use chart_service::ChartService;
pub use refresh::{subscribe, ChartSubscription};
