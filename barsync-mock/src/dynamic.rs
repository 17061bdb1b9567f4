use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use barsync_core::connector::DataSource;
use barsync_core::{Bar, Resolution, SplitRecord, SyncError};

/// Instruction for how a method should behave for a given input.
#[derive(Clone, Debug)]
pub enum MockBehavior<T> {
    /// Return the provided value (filtered to the requested window).
    Return(T),
    /// Fail immediately with the provided error.
    Fail(SyncError),
    /// Hang indefinitely (simulate a stalled provider).
    Hang,
}

/// One call observed by a [`MockSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceCall {
    /// `fetch_bars` was invoked.
    Bars {
        /// Requested symbol.
        symbol: String,
        /// Window start.
        from: DateTime<Utc>,
        /// Window end.
        to: DateTime<Utc>,
        /// Requested resolution.
        resolution: Resolution,
    },
    /// `fetch_splits` was invoked.
    Splits {
        /// Requested symbol.
        symbol: String,
        /// Window start.
        from: DateTime<Utc>,
        /// Window end.
        to: DateTime<Utc>,
    },
}

impl SourceCall {
    /// Symbol the call was made for.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Bars { symbol, .. } | Self::Splits { symbol, .. } => symbol,
        }
    }
}

#[derive(Default)]
struct InternalState {
    bar_rules: HashMap<(String, Resolution), MockBehavior<Vec<Bar>>>,
    split_rules: HashMap<String, MockBehavior<Vec<SplitRecord>>>,
    calls: Vec<SourceCall>,
}

/// Controller handle used by tests to script a [`MockSource`] from the outside.
#[derive(Clone)]
pub struct MockController {
    state: Arc<Mutex<InternalState>>,
}

impl MockController {
    /// Set the behavior for `fetch_bars` calls for a symbol and resolution.
    pub async fn set_bars(&self, symbol: &str, resolution: Resolution, behavior: MockBehavior<Vec<Bar>>) {
        let mut guard = self.state.lock().await;
        guard
            .bar_rules
            .insert((symbol.to_string(), resolution), behavior);
    }

    /// Shorthand for `set_bars(.., MockBehavior::Return(bars))`.
    pub async fn return_bars(&self, symbol: &str, resolution: Resolution, bars: Vec<Bar>) {
        self.set_bars(symbol, resolution, MockBehavior::Return(bars))
            .await;
    }

    /// Set the behavior for `fetch_splits` calls for a symbol.
    pub async fn set_splits(&self, symbol: &str, behavior: MockBehavior<Vec<SplitRecord>>) {
        let mut guard = self.state.lock().await;
        guard.split_rules.insert(symbol.to_string(), behavior);
    }

    /// Shorthand for `set_splits(.., MockBehavior::Return(splits))`.
    pub async fn return_splits(&self, symbol: &str, splits: Vec<SplitRecord>) {
        self.set_splits(symbol, MockBehavior::Return(splits)).await;
    }

    /// Every call observed so far, in order.
    pub async fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls observed for one symbol.
    pub async fn calls_for(&self, symbol: &str) -> Vec<SourceCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.symbol() == symbol)
            .cloned()
            .collect()
    }

    /// Number of calls observed so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Forget the call log, keeping configured behaviors.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Clear all configured behaviors and the call log.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.bar_rules.clear();
        guard.split_rules.clear();
        guard.calls.clear();
    }
}

/// A data source that defers all behavior to a [`MockController`].
///
/// Symbols without a configured behavior answer with an empty series.
/// `Return` values are filtered to the requested inclusive window, so one
/// scripted history can serve overlap and reload fetches alike.
pub struct MockSource {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl MockSource {
    /// Create a new mock source and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<dyn DataSource>, MockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = MockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { name, state });
        (me as Arc<dyn DataSource>, controller)
    }
}

async fn resolve<T>(behavior: Option<MockBehavior<T>>) -> Result<Option<T>, SyncError> {
    match behavior {
        None => Ok(None),
        Some(MockBehavior::Return(v)) => Ok(Some(v)),
        Some(MockBehavior::Fail(e)) => Err(e),
        Some(MockBehavior::Hang) => std::future::pending().await,
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Vec<Bar>, SyncError> {
        // Snapshot the behavior without holding the lock across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.calls.push(SourceCall::Bars {
                symbol: symbol.to_string(),
                from,
                to,
                resolution,
            });
            guard
                .bar_rules
                .get(&(symbol.to_string(), resolution))
                .cloned()
        };
        let bars = resolve(behavior).await?.unwrap_or_default();
        Ok(bars
            .into_iter()
            .filter(|b| b.ts >= from && b.ts <= to)
            .collect())
    }

    async fn fetch_splits(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.calls.push(SourceCall::Splits {
                symbol: symbol.to_string(),
                from,
                to,
            });
            guard.split_rules.get(symbol).cloned()
        };
        let splits = resolve(behavior).await?.unwrap_or_default();
        let (lo, hi) = (from.date_naive(), to.date_naive());
        Ok(splits
            .into_iter()
            .filter(|s| s.date >= lo && s.date <= hi)
            .collect())
    }
}
