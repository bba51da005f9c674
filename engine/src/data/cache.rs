// Keyed candle cache with per-interval freshness and single-flight refresh.
use chart_shared::{Candle, CandleSeries, Interval};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

use super::CandleSource;
use crate::clock::Clock;
use crate::config::CachePolicy;
use crate::error::EngineError;

type FetchResult = Result<Arc<CandleSeries>, Arc<EngineError>>;
type InFlight = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    instrument: String,
    interval: Interval,
}

impl CacheKey {
    fn new(instrument: &str, interval: Interval) -> Self {
        Self {
            instrument: instrument.to_string(),
            interval,
        }
    }
}

struct CacheEntry {
    series: Arc<CandleSeries>,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    /// Bumped on invalidation so fetches started earlier cannot write back.
    epochs: HashMap<CacheKey, u64>,
}

impl CacheState {
    fn epoch(&self, key: &CacheKey) -> u64 {
        self.epochs.get(key).copied().unwrap_or(0)
    }

    fn bump_epoch(&mut self, key: &CacheKey) {
        *self.epochs.entry(key.clone()).or_insert(0) += 1;
    }
}

struct Inner {
    source: Arc<dyn CandleSource>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Cached,
    Fetched,
    Failed,
}

/// Result of a cache lookup. On failure `series` is empty and `error` carries the cause.
#[derive(Debug, Clone)]
pub struct CandleLoad {
    pub series: Arc<CandleSeries>,
    pub origin: LoadOrigin,
    pub error: Option<Arc<EngineError>>,
}

impl CandleLoad {
    fn cached(series: Arc<CandleSeries>) -> Self {
        Self { series, origin: LoadOrigin::Cached, error: None }
    }

    fn fetched(series: Arc<CandleSeries>) -> Self {
        Self { series, origin: LoadOrigin::Fetched, error: None }
    }

    fn failed(error: Arc<EngineError>) -> Self {
        Self {
            series: Arc::new(CandleSeries::new()),
            origin: LoadOrigin::Failed,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Handle to a candle cache. Clones share the same entries.
#[derive(Clone)]
pub struct CandleCache {
    inner: Arc<Inner>,
}

impl CandleCache {
    pub fn new(source: Arc<dyn CandleSource>, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                policy,
                clock,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Candles for the key, empty on failure.
    pub async fn get(&self, instrument: &str, interval: Interval) -> Arc<CandleSeries> {
        self.load(instrument, interval).await.series
    }

    /// Serves a fresh entry as is, otherwise joins or starts the one fetch allowed per key.
    /// Never fails: source errors are logged and surface through [`CandleLoad::error`].
    pub async fn load(&self, instrument: &str, interval: Interval) -> CandleLoad {
        let key = CacheKey::new(instrument, interval);
        let now = self.inner.clock.now();
        let max_age = self.inner.policy.duration_for(interval);

        let flight = {
            let mut state = self.inner.state.lock().await;
            if let Some(entry) = state.entries.get(&key) {
                if now - entry.fetched_at < max_age {
                    tracing::debug!(instrument, %interval, "Serving cached candles");
                    return CandleLoad::cached(entry.series.clone());
                }
            }
            match state.in_flight.get(&key) {
                Some(flight) => {
                    tracing::debug!(instrument, %interval, "Joining in-flight candle fetch");
                    flight.clone()
                }
                None => {
                    let flight = self.start_fetch(key.clone(), state.epoch(&key), now);
                    state.in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        match flight.await {
            Ok(series) => CandleLoad::fetched(series),
            Err(error) => {
                tracing::warn!(
                    instrument,
                    %interval,
                    source = %self.inner.source.name(),
                    error = %error,
                    "Candle fetch failed, returning empty series"
                );
                CandleLoad::failed(error)
            }
        }
    }

    fn start_fetch(&self, key: CacheKey, epoch: u64, requested_at: DateTime<Utc>) -> InFlight {
        let source = Arc::clone(&self.inner.source);
        let cache: Weak<Inner> = Arc::downgrade(&self.inner);

        async move {
            let result = source.fetch(&key.instrument, key.interval).await;

            let Some(inner) = cache.upgrade() else {
                return result.map(Arc::new).map_err(Arc::new);
            };
            let mut state = inner.state.lock().await;
            let current = state.epoch(&key) == epoch;
            if current {
                state.in_flight.remove(&key);
            }

            match result {
                Ok(series) => {
                    let series = Arc::new(series);
                    if current {
                        tracing::info!(
                            instrument = %key.instrument,
                            interval = %key.interval,
                            count = series.len(),
                            "Cached fresh candles"
                        );
                        state.entries.insert(key, CacheEntry { series: series.clone(), fetched_at: requested_at });
                    } else {
                        tracing::debug!(
                            instrument = %key.instrument,
                            interval = %key.interval,
                            "Discarding candles fetched before invalidation"
                        );
                    }
                    Ok(series)
                }
                // Previous entry, if any, stays in place.
                Err(e) => Err(Arc::new(e)),
            }
        }
        .boxed()
        .shared()
    }

    /// Merges one candle into the cached series via [`CandleSeries::append_or_update`].
    /// The entry keeps its original fetch time.
    pub async fn merge_candle(
        &self,
        instrument: &str,
        interval: Interval,
        candle: Candle,
    ) -> Result<Arc<CandleSeries>, EngineError> {
        let key = CacheKey::new(instrument, interval);
        let mut state = self.inner.state.lock().await;
        let entry = state.entries.get_mut(&key).ok_or_else(|| {
            EngineError::MarketDataError(format!(
                "No cached candles for '{}' at {} to merge into, not found",
                instrument, interval
            ))
        })?;
        let merged = Arc::new(entry.series.append_or_update(candle)?);
        entry.series = merged.clone();
        tracing::debug!(instrument, %interval, time = candle.time, len = merged.len(), "Merged live candle");
        Ok(merged)
    }

    /// The cached series regardless of age, without fetching.
    pub async fn peek(&self, instrument: &str, interval: Interval) -> Option<Arc<CandleSeries>> {
        let state = self.inner.state.lock().await;
        state.entries.get(&CacheKey::new(instrument, interval)).map(|e| e.series.clone())
    }

    /// Drops the entry and detaches any in-flight fetch so its result is not stored.
    pub async fn invalidate(&self, instrument: &str, interval: Interval) {
        let key = CacheKey::new(instrument, interval);
        let mut state = self.inner.state.lock().await;
        state.entries.remove(&key);
        state.in_flight.remove(&key);
        state.bump_epoch(&key);
        tracing::debug!(instrument, %interval, "Invalidated cached candles");
    }

    pub async fn invalidate_all(&self) {
        let mut state = self.inner.state.lock().await;
        let keys: Vec<CacheKey> = state.entries.keys().chain(state.in_flight.keys()).cloned().collect();
        for key in &keys {
            state.bump_epoch(key);
        }
        state.entries.clear();
        state.in_flight.clear();
        tracing::debug!(keys = keys.len(), "Invalidated all cached candles");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::test_support::CountingSource;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    const BTC: &str = "BTC-PERP";

    fn setup(latency: Duration) -> (CandleCache, Arc<CountingSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let source = Arc::new(CountingSource::new(clock.clone(), latency));
        let cache = CandleCache::new(source.clone(), CachePolicy::default(), clock.clone());
        (cache, source, clock)
    }

    #[tokio::test]
    async fn test_fresh_entry_is_reused() {
        let (cache, source, clock) = setup(Duration::ZERO);
        let first = cache.load(BTC, Interval::Minute1).await;
        clock.advance(ChronoDuration::seconds(59));
        let second = cache.load(BTC, Interval::Minute1).await;

        assert_eq!(first.origin, LoadOrigin::Fetched);
        assert_eq!(second.origin, LoadOrigin::Cached);
        assert!(Arc::ptr_eq(&first.series, &second.series));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched_per_interval_policy() {
        let (cache, source, clock) = setup(Duration::ZERO);
        cache.get(BTC, Interval::Minute5).await;
        cache.get(BTC, Interval::Hour1).await;
        cache.get(BTC, Interval::Week1).await;
        assert_eq!(source.calls(), 3);

        clock.advance(ChronoDuration::seconds(60));
        cache.get(BTC, Interval::Minute5).await;
        cache.get(BTC, Interval::Hour1).await;
        cache.get(BTC, Interval::Week1).await;
        assert_eq!(source.calls(), 4);

        clock.advance(ChronoDuration::seconds(240));
        cache.get(BTC, Interval::Hour1).await;
        cache.get(BTC, Interval::Week1).await;
        assert_eq!(source.calls(), 5);

        clock.advance(ChronoDuration::seconds(3300));
        cache.get(BTC, Interval::Week1).await;
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn test_oversized_policy_keeps_entries_forever() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let source = Arc::new(CountingSource::new(clock.clone(), Duration::ZERO));
        let policy = CachePolicy { daily_secs: u64::MAX, ..CachePolicy::default() };
        let cache = CandleCache::new(source.clone(), policy, clock.clone());

        assert_eq!(cache.load(BTC, Interval::Day1).await.origin, LoadOrigin::Fetched);
        clock.advance(ChronoDuration::days(365 * 50));
        assert_eq!(cache.load(BTC, Interval::Day1).await.origin, LoadOrigin::Cached);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (cache, source, _clock) = setup(Duration::ZERO);
        cache.get(BTC, Interval::Hour1).await;
        cache.get("ETH-PERP", Interval::Hour1).await;
        cache.get(BTC, Interval::Hour4).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_fetch() {
        let (cache, source, _clock) = setup(Duration::from_millis(200));
        let (a, b, c) = tokio::join!(
            cache.load(BTC, Interval::Minute1),
            cache.load(BTC, Interval::Minute1),
            cache.load(BTC, Interval::Minute1),
        );
        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&a.series, &b.series));
        assert!(Arc::ptr_eq(&b.series, &c.series));
        assert!([a.origin, b.origin, c.origin].iter().all(|o| *o == LoadOrigin::Fetched));

        let later = cache.load(BTC, Interval::Minute1).await;
        assert_eq!(later.origin, LoadOrigin::Cached);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refresh_triggers_exactly_one_fetch() {
        let (cache, source, clock) = setup(Duration::from_millis(200));
        cache.get(BTC, Interval::Hour1).await;
        clock.advance(ChronoDuration::seconds(301));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load(BTC, Interval::Hour1).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().origin, LoadOrigin::Fetched);
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_soft_and_keeps_previous_entry() {
        let (cache, source, clock) = setup(Duration::ZERO);
        let good = cache.get(BTC, Interval::Minute1).await;
        assert!(!good.is_empty());

        source.set_failing(true);
        clock.advance(ChronoDuration::seconds(61));
        let failed = cache.load(BTC, Interval::Minute1).await;
        assert_eq!(failed.origin, LoadOrigin::Failed);
        assert!(failed.series.is_empty());
        assert!(failed.error.as_ref().unwrap().is_retryable());

        let kept = cache.peek(BTC, Interval::Minute1).await.unwrap();
        assert!(Arc::ptr_eq(&kept, &good));

        // a failed fetch leaves no in-flight registration behind
        source.set_failing(false);
        let retried = cache.load(BTC, Interval::Minute1).await;
        assert_eq!(retried.origin, LoadOrigin::Fetched);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_without_previous_entry() {
        let (cache, source, _clock) = setup(Duration::ZERO);
        source.set_failing(true);
        let load = cache.load(BTC, Interval::Day1).await;
        assert!(load.is_error());
        assert!(load.series.is_empty());
        assert!(cache.peek(BTC, Interval::Day1).await.is_none());
    }

    #[tokio::test]
    async fn test_merge_candle_updates_cached_series() {
        let (cache, source, _clock) = setup(Duration::ZERO);
        let original = cache.get(BTC, Interval::Minute1).await;
        let last = *original.last().unwrap();

        let forming = Candle { close: last.close + 1.0, high: last.high.max(last.close + 1.0), ..last };
        let merged = cache.merge_candle(BTC, Interval::Minute1, forming).await.unwrap();
        assert_eq!(merged.len(), original.len());
        assert_eq!(&merged[..merged.len() - 1], &original[..original.len() - 1]);
        assert_eq!(merged.last().unwrap().close, last.close + 1.0);

        let next = Candle { time: last.time + 60, open: forming.close, high: forming.close, low: forming.close, close: forming.close, volume: None };
        let appended = cache.merge_candle(BTC, Interval::Minute1, next).await.unwrap();
        assert_eq!(appended.len(), original.len() + 1);

        // still fresh, so get serves the merged series without refetching
        let served = cache.get(BTC, Interval::Minute1).await;
        assert!(Arc::ptr_eq(&served, &appended));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_merge_candle_errors() {
        let (cache, _source, _clock) = setup(Duration::ZERO);
        let candle = Candle { time: 0, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: None };
        assert!(matches!(
            cache.merge_candle(BTC, Interval::Minute1, candle).await,
            Err(EngineError::MarketDataError(_))
        ));

        let series = cache.get(BTC, Interval::Minute1).await;
        let stale = Candle { time: series[0].time - 60, ..candle };
        assert!(matches!(
            cache.merge_candle(BTC, Interval::Minute1, stale).await,
            Err(EngineError::SeriesError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_discards_in_flight_result() {
        let (cache, source, _clock) = setup(Duration::from_millis(200));
        let background = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load(BTC, Interval::Hour1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.invalidate(BTC, Interval::Hour1).await;

        let load = background.await.unwrap();
        assert_eq!(load.origin, LoadOrigin::Fetched);
        assert!(cache.peek(BTC, Interval::Hour1).await.is_none());

        cache.get(BTC, Interval::Hour1).await;
        assert_eq!(source.calls(), 2);
        assert!(cache.peek(BTC, Interval::Hour1).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_refetch() {
        let (cache, source, _clock) = setup(Duration::ZERO);
        cache.get(BTC, Interval::Hour1).await;
        cache.get("ETH-PERP", Interval::Day1).await;
        cache.invalidate_all().await;
        assert!(cache.peek(BTC, Interval::Hour1).await.is_none());
        cache.get(BTC, Interval::Hour1).await;
        assert_eq!(source.calls(), 3);
    }
}
