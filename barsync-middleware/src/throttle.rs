//! Throttling wrapper that delays provider calls instead of failing them.
//!
//! Every call made through a [`ThrottledSource`] waits for a start slot. Slots
//! are handed out in arrival order and are at least `min_spacing` apart; with a
//! `limit` set, no more than `limit` calls start within any `window`.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

use barsync_core::{
    Bar, DataSource, Resolution, SourceMiddleware, SplitRecord, SyncError, ThrottleConfig,
};

/// Wrapper that spaces calls to the inner source.
pub struct ThrottledSource {
    inner: Arc<dyn DataSource>,
    config: ThrottleConfig,
    runtime: Mutex<ThrottleRuntime>,
}

struct ThrottleRuntime {
    last_start: Option<Instant>,
    // Start instants of the most recent `limit` calls, oldest first.
    starts: VecDeque<Instant>,
}

impl ThrottledSource {
    /// Create a new throttling wrapper around an existing source.
    #[must_use]
    pub fn new(inner: Arc<dyn DataSource>, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            runtime: Mutex::new(ThrottleRuntime {
                last_start: None,
                starts: VecDeque::new(),
            }),
        }
    }

    /// Access the inner source.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn DataSource> {
        &self.inner
    }

    /// Throttle settings in effect.
    #[must_use]
    pub const fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Wait until the next call may start and claim that slot.
    ///
    /// The runtime lock is held while sleeping, so waiters are served in
    /// arrival order and no two callers claim the same slot.
    async fn acquire(&self) {
        let mut rt = self.runtime.lock().await;
        let now = Instant::now();

        let mut earliest = rt
            .last_start
            .map_or(now, |last| last + self.config.min_spacing);

        let limit = self.window_limit();
        if let Some(oldest) = rt.starts.front()
            && limit.is_some_and(|l| rt.starts.len() >= l)
        {
            earliest = earliest.max(*oldest + self.config.window);
        }

        if earliest > now {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "barsync::throttle",
                provider = self.inner.name(),
                wait_ms = u64::try_from((earliest - now).as_millis()).unwrap_or(u64::MAX),
                "delaying provider call"
            );
            sleep_until(earliest).await;
        }

        let started = Instant::now().max(earliest);
        rt.last_start = Some(started);
        if let Some(limit) = limit {
            rt.starts.push_back(started);
            while rt.starts.len() > limit {
                rt.starts.pop_front();
            }
        }
    }

    fn window_limit(&self) -> Option<usize> {
        self.config
            .limit
            .filter(|l| *l > 0)
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
    }
}

#[async_trait]
impl DataSource for ThrottledSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Vec<Bar>, SyncError> {
        self.acquire().await;
        self.inner.fetch_bars(symbol, from, to, resolution).await
    }

    async fn fetch_splits(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        self.acquire().await;
        self.inner.fetch_splits(symbol, from, to).await
    }
}

/// Middleware config for constructing a [`ThrottledSource`].
pub struct ThrottleMiddleware {
    /// Spacing and window settings applied to the wrapped source.
    pub config: ThrottleConfig,
}

impl ThrottleMiddleware {
    /// Create the middleware from its settings.
    #[must_use]
    pub const fn new(config: ThrottleConfig) -> Self {
        Self { config }
    }
}

impl SourceMiddleware for ThrottleMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn DataSource>) -> Arc<dyn DataSource> {
        Arc::new(ThrottledSource::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "ThrottledSource"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "min_spacing_ms": u64::try_from(self.config.min_spacing.as_millis()).unwrap_or(u64::MAX),
            "limit": self.config.limit,
            "window_ms": u64::try_from(self.config.window.as_millis()).unwrap_or(u64::MAX),
        })
    }
}
