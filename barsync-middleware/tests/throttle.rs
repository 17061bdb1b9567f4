use std::sync::Arc;
use std::time::Duration;

use barsync_core::{DataSource, Resolution, SyncError, ThrottleConfig};
use barsync_middleware::{SourceBuilder, ThrottleMiddleware, ThrottledSource};
use barsync_mock::fixtures::{bar, ts};
use barsync_mock::{MockBehavior, MockSource};
use tokio::time::Instant;

fn spacing_only(ms: u64) -> ThrottleConfig {
    ThrottleConfig {
        min_spacing: Duration::from_millis(ms),
        limit: None,
        window: Duration::from_secs(60),
    }
}

async fn fetch(source: &Arc<dyn DataSource>, symbol: &str) -> Result<usize, SyncError> {
    source
        .fetch_bars(
            symbol,
            ts("2024-03-01T00:00:00Z"),
            ts("2024-03-02T00:00:00Z"),
            Resolution::Daily,
        )
        .await
        .map(|bars| bars.len())
}

#[tokio::test(start_paused = true)]
async fn first_call_is_not_delayed() {
    let (raw, _ctrl) = MockSource::new_with_controller("mock");
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(1100)));

    let started = Instant::now();
    fetch(&source, "AAPL").await.expect("call succeeds");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn consecutive_calls_are_spaced() {
    let (raw, ctrl) = MockSource::new_with_controller("mock");
    ctrl.return_bars(
        "AAPL",
        Resolution::Daily,
        vec![bar("AAPL", ts("2024-03-01T00:00:00Z"), 10)],
    )
    .await;
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(1100)));

    let started = Instant::now();
    for _ in 0..3 {
        assert_eq!(fetch(&source, "AAPL").await.expect("call succeeds"), 1);
    }
    // Two gaps of 1.1s between three back-to-back calls.
    assert!(started.elapsed() >= Duration::from_millis(2200));
    assert!(started.elapsed() < Duration::from_millis(2300));
    assert_eq!(ctrl.call_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn split_calls_share_the_same_spacing() {
    let (raw, ctrl) = MockSource::new_with_controller("mock");
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(500)));

    let started = Instant::now();
    fetch(&source, "AAPL").await.expect("bars");
    source
        .fetch_splits("AAPL", ts("2024-01-01T00:00:00Z"), ts("2024-03-01T00:00:00Z"))
        .await
        .expect("splits");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(ctrl.call_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn idle_time_counts_toward_spacing() {
    let (raw, _ctrl) = MockSource::new_with_controller("mock");
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(1000)));

    fetch(&source, "AAPL").await.expect("first");
    tokio::time::sleep(Duration::from_secs(5)).await;
    let started = Instant::now();
    fetch(&source, "MSFT").await.expect("second");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn window_limit_delays_rather_than_fails() {
    let (raw, ctrl) = MockSource::new_with_controller("mock");
    let cfg = ThrottleConfig {
        min_spacing: Duration::ZERO,
        limit: Some(2),
        window: Duration::from_secs(60),
    };
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, cfg));

    let started = Instant::now();
    fetch(&source, "A").await.expect("1");
    fetch(&source, "B").await.expect("2");
    assert_eq!(started.elapsed(), Duration::ZERO);
    fetch(&source, "C").await.expect("third waits for the window");
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(ctrl.call_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_each_get_their_own_slot() {
    let (raw, ctrl) = MockSource::new_with_controller("mock");
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(1000)));

    let started = Instant::now();
    let tasks: Vec<_> = ["A", "B", "C", "D"]
        .into_iter()
        .map(|s| {
            let source = Arc::clone(&source);
            tokio::spawn(async move { fetch(&source, s).await })
        })
        .collect();
    for t in tasks {
        t.await.expect("task joins").expect("call succeeds");
    }
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(ctrl.call_count().await, 4);
}

#[tokio::test(start_paused = true)]
async fn inner_errors_pass_through_unchanged() {
    let (raw, ctrl) = MockSource::new_with_controller("mock");
    ctrl.set_bars(
        "GME",
        Resolution::Daily,
        MockBehavior::Fail(SyncError::provider("mock", "HTTP 429")),
    )
    .await;
    let source: Arc<dyn DataSource> = Arc::new(ThrottledSource::new(raw, spacing_only(1100)));

    let err = fetch(&source, "GME").await.expect_err("inner fails");
    assert_eq!(err, SyncError::provider("mock", "HTTP 429"));
    // The failed call still consumed its slot.
    let started = Instant::now();
    fetch(&source, "AAPL").await.expect("next call");
    assert!(started.elapsed() >= Duration::from_millis(1100));
}

#[tokio::test]
async fn builder_wraps_and_describes_stack() {
    let (raw, _ctrl) = MockSource::new_with_controller("mock");
    let builder = SourceBuilder::new(raw)
        .with_throttle(spacing_only(250))
        .with_throttle(spacing_only(1100));

    let stack = builder.describe();
    let layers = stack.as_array().expect("array");
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0]["name"], "ThrottledSource");
    assert_eq!(layers[0]["config"]["min_spacing_ms"], 1100);
    assert_eq!(layers[1]["name"], "RawSource");
    assert_eq!(layers[1]["config"]["name"], "mock");

    let built = builder.build();
    assert_eq!(built.name(), "mock");
}

#[test]
fn without_throttle_leaves_raw_source() {
    let (raw, _ctrl) = MockSource::new_with_controller("mock");
    let builder = SourceBuilder::new(raw)
        .with_throttle(ThrottleConfig::default())
        .without_throttle();
    assert_eq!(builder.describe().as_array().map(Vec::len), Some(1));
}

#[test]
fn middleware_reports_its_config() {
    use barsync_core::SourceMiddleware;

    let mw = ThrottleMiddleware::new(ThrottleConfig {
        min_spacing: Duration::from_millis(1100),
        limit: Some(60),
        window: Duration::from_secs(60),
    });
    assert_eq!(mw.name(), "ThrottledSource");
    let cfg = mw.config_json();
    assert_eq!(cfg["min_spacing_ms"], 1100);
    assert_eq!(cfg["limit"], 60);
    assert_eq!(cfg["window_ms"], 60_000);
}
