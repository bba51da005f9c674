// Timer-driven refresh of an open chart.
use chart_shared::Interval;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::data::{CandleCache, CandleLoad};

/// Live view of one chart. Dropping it stops the refresh task.
pub struct ChartSubscription {
    updates: mpsc::Receiver<CandleLoad>,
    task: JoinHandle<()>,
}

impl ChartSubscription {
    /// Next load result. `None` once the task has stopped, which happens after the initial
    /// load for intervals that are not refreshed.
    pub async fn next(&mut self) -> Option<CandleLoad> {
        self.updates.recv().await
    }
}

impl Drop for ChartSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Loads once immediately, then every `period` for live intervals (1m, 5m, 15m).
pub fn subscribe(cache: CandleCache, instrument: String, interval: Interval, period: Duration) -> ChartSubscription {
    let (tx, rx) = mpsc::channel(4);

    let task = tokio::spawn(async move {
        let initial = cache.load(&instrument, interval).await;
        if tx.send(initial).await.is_err() {
            return;
        }
        if !interval.is_live() {
            tracing::debug!(instrument = %instrument, %interval, "Interval not refreshed periodically");
            return;
        }

        let Some(start) = Instant::now().checked_add(period).filter(|_| !period.is_zero()) else {
            tracing::warn!(instrument = %instrument, %interval, ?period, "Unusable refresh period, not refreshing");
            return;
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::trace!(instrument = %instrument, %interval, "Refresh tick");
            let load = cache.load(&instrument, interval).await;
            if tx.send(load).await.is_err() {
                tracing::debug!(instrument = %instrument, %interval, "Subscriber gone, stopping refresh");
                break;
            }
        }
    });

    ChartSubscription { updates: rx, task }
}
