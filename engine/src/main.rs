// Chart engine driver: loads settings, fetches candles for each configured instrument and
// prints a JSON summary with the configured overlays.
use anyhow::Context;
use chart_engine::clock::{Clock, SystemClock};
use chart_engine::config::ChartSettings;
use chart_engine::services::ChartService;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting chart engine...");

    // First argument or CHART_ENGINE_CONFIG points at a settings file; embedded defaults otherwise.
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CHART_ENGINE_CONFIG").ok())
        .map(PathBuf::from);
    let settings = match &config_path {
        Some(path) => ChartSettings::load(path).with_context(|| format!("loading settings from {}", path.display()))?,
        None => ChartSettings::load_default().context("loading embedded default settings")?,
    };
    info!(instruments = ?settings.instruments, interval = %settings.interval, "Settings loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = ChartService::from_settings(&settings, clock);

    let mut charts = Vec::new();
    for instrument in &settings.instruments {
        let load = service.get_candles(instrument, settings.interval).await;
        if let Some(error) = &load.error {
            warn!(instrument = %instrument, error = %error, retryable = error.is_retryable(), "No candles available");
        }
        let overlays: Vec<_> = settings
            .indicators
            .iter()
            .map(|kind| service.compute_indicator(&load.series, kind))
            .map(|out| {
                let latest: Vec<_> = out.lines.iter().map(|l| json!({ "line": l.name, "last": l.points.last() })).collect();
                json!({ "name": out.name, "lines": latest })
            })
            .collect();
        charts.push(json!({
            "instrument": instrument,
            "interval": settings.interval,
            "candles": load.series.len(),
            "first": load.series.first(),
            "last": load.series.last(),
            "error": load.error.as_ref().map(|e| e.to_string()),
            "indicators": overlays,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&charts)?);

    if settings.watch_secs > 0 {
        if let Some(instrument) = settings.instruments.first() {
            watch(&service, instrument, &settings, Duration::from_secs(settings.watch_secs)).await;
        }
    }

    info!("Chart engine finished.");
    Ok(())
}

/// Follows one chart for `duration`, logging each refresh. The subscription is released on return.
async fn watch(service: &ChartService, instrument: &str, settings: &ChartSettings, duration: Duration) {
    let mut subscription = service.subscribe(instrument, settings.interval);
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            update = subscription.next() => match update {
                Some(load) => info!(
                    instrument,
                    origin = ?load.origin,
                    candles = load.series.len(),
                    last_close = ?load.series.last().map(|c| c.close),
                    "Chart update"
                ),
                None => break,
            },
        }
    }
}
