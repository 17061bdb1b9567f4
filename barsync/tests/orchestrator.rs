use std::sync::Arc;
use std::time::Duration;

use barsync::{Orchestrator, RunStatus, SymbolOutcome};
use barsync_core::{
    AlertSink, Clock, Resolution, SkipList, SkipListSink, StorageBackend, SyncError,
    Bar, DataSource, SplitRecord, ThrottleConfig,
};
use barsync_middleware::ThrottleMiddleware;
use barsync_mock::fixtures::{bar, series, ts};
use barsync_mock::{
    FixedClock, MemorySkipListSink, MemoryStorage, MockBehavior, MockController, MockSource,
    RecordingAlertSink,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

struct Fixture {
    orchestrator: Orchestrator,
    provider: MockController,
    storage: Arc<MemoryStorage>,
    alerts: Arc<RecordingAlertSink>,
}

fn fixture_with_alerts(alerts: Arc<RecordingAlertSink>) -> Fixture {
    let (source, provider) = MockSource::new_with_controller("mock");
    let storage = Arc::new(MemoryStorage::new());
    let sink: Arc<dyn SkipListSink> = Arc::new(MemorySkipListSink::new());
    let orchestrator = Orchestrator::builder()
        .source(source)
        .storage(storage.clone() as Arc<dyn StorageBackend>)
        .skip_list(Arc::new(SkipList::new(sink)))
        .alerts(alerts.clone() as Arc<dyn AlertSink>)
        .clock(Arc::new(FixedClock::new(ts("2024-03-01T21:00:00Z"))) as Arc<dyn Clock>)
        .build()
        .expect("orchestrator builds");
    Fixture {
        orchestrator,
        provider,
        storage,
        alerts,
    }
}

fn fixture() -> Fixture {
    fixture_with_alerts(Arc::new(RecordingAlertSink::new()))
}

fn daily_history(symbol: &str) -> Vec<barsync_core::Bar> {
    series(symbol, ts("2024-02-26T00:00:00Z"), TimeDelta::days(1), 5, 100)
}

#[tokio::test]
async fn pass_processes_universe_in_order() {
    let f = fixture();
    for s in ["AAPL", "MSFT", "TSLA"] {
        f.provider
            .return_bars(s, Resolution::Daily, daily_history(s))
            .await;
    }

    let report = f
        .orchestrator
        .run_pass(Resolution::Daily, &["TSLA", "AAPL", "MSFT"])
        .await
        .expect("pass succeeds");

    let order: Vec<&str> = report.symbols.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(order, vec!["TSLA", "AAPL", "MSFT"]);
    let called: Vec<String> = f
        .provider
        .calls()
        .await
        .iter()
        .map(|c| c.symbol().to_string())
        .collect();
    assert_eq!(called, vec!["TSLA", "AAPL", "MSFT"]);
    assert_eq!(report.count("reloaded"), 3);
    assert_eq!(report.rows_written(), 15);
    assert!(f.alerts.messages().is_empty());
}

#[tokio::test]
async fn provider_failure_aborts_pass_with_one_alert() {
    let f = fixture();
    f.provider
        .return_bars("AAPL", Resolution::Intraday, vec![bar("AAPL", ts("2024-03-01T15:00:00Z"), 1)])
        .await;
    f.provider
        .set_bars(
            "GME",
            Resolution::Intraday,
            MockBehavior::Fail(SyncError::provider("mock", "HTTP 502")),
        )
        .await;

    let failure = f
        .orchestrator
        .run_pass(Resolution::Intraday, &["AAPL", "GME", "MSFT"])
        .await
        .expect_err("pass fails");

    assert_eq!(failure.symbol.as_deref(), Some("GME"));
    assert_eq!(failure.completed, 1);
    assert_eq!(failure.table, "intraday_raw");
    assert_eq!(failure.error.category(), "provider");
    // MSFT was never attempted.
    assert!(f.provider.calls_for("MSFT").await.is_empty());
    // AAPL's work before the failure is kept.
    assert_eq!(f.storage.rows("AAPL", Resolution::Intraday).len(), 1);

    let alerts = f.alerts.messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("intraday_raw"));
    assert!(alerts[0].contains("GME"));
    assert!(alerts[0].contains("(provider)"));
    assert!(alerts[0].contains("2024-03-01T21:00:00+00:00"));
}

#[tokio::test]
async fn alert_delivery_failure_does_not_mask_pass_failure() {
    let f = fixture_with_alerts(Arc::new(RecordingAlertSink::failing(SyncError::Other(
        "pager offline".into(),
    ))));
    f.storage
        .fail_writes(Some(SyncError::storage_write("disk full")));
    f.provider
        .return_bars("AAPL", Resolution::Daily, daily_history("AAPL"))
        .await;

    let failure = f
        .orchestrator
        .run_pass(Resolution::Daily, &["AAPL"])
        .await
        .expect_err("write fails");
    assert_eq!(failure.error, SyncError::storage_write("disk full"));
    assert_eq!(f.alerts.messages().len(), 1);
}

#[tokio::test]
async fn anomaly_does_not_abort_pass() {
    let f = fixture();
    let t = ts("2024-03-01T15:00:00Z");
    f.storage.seed(Resolution::Intraday, vec![bar("Z", t, 1000)]);
    f.provider
        .return_bars("Z", Resolution::Intraday, vec![bar("Z", t, 1300)])
        .await;
    f.provider
        .return_bars("AAPL", Resolution::Intraday, vec![bar("AAPL", t, 5)])
        .await;

    let report = f
        .orchestrator
        .run_pass(Resolution::Intraday, &["Z", "AAPL"])
        .await
        .expect("anomalies are not failures");
    assert_eq!(report.anomalies().count(), 1);
    assert!(matches!(
        report.outcome("AAPL"),
        Some(SymbolOutcome::Reloaded { rows: 1, .. })
    ));
    assert!(f.alerts.messages().is_empty());
}

#[tokio::test]
async fn duplicate_symbols_are_rejected_before_any_work() {
    let f = fixture();
    let failure = f
        .orchestrator
        .run_pass(Resolution::Daily, &["AAPL", "MSFT", "AAPL"])
        .await
        .expect_err("duplicate rejected");
    assert!(matches!(failure.error, SyncError::InvalidArg(_)));
    assert_eq!(f.provider.call_count().await, 0);
    assert_eq!(f.alerts.messages().len(), 1);
}

#[tokio::test]
async fn unknown_table_is_unsupported_resolution() {
    let f = fixture();
    let failure = f
        .orchestrator
        .run_table("split_ref", &["AAPL"])
        .await
        .expect_err("split table is not a bar table");
    assert!(matches!(
        failure.error,
        SyncError::UnsupportedResolution { ref table } if table == "split_ref"
    ));
    assert!(failure.error.is_fatal_precondition());
    assert_eq!(failure.resolution, None);
    assert_eq!(f.provider.call_count().await, 0);
    assert_eq!(f.alerts.messages().len(), 1);

    f.provider
        .return_bars("AAPL", Resolution::Daily, daily_history("AAPL"))
        .await;
    let report = f
        .orchestrator
        .run_table("daily_raw", &["AAPL"])
        .await
        .expect("daily table resolves");
    assert_eq!(report.resolution, Resolution::Daily);
}

#[tokio::test]
async fn one_failing_pass_does_not_stop_the_other() {
    let f = fixture();
    f.provider
        .return_bars("AAPL", Resolution::Daily, daily_history("AAPL"))
        .await;
    f.provider
        .set_bars(
            "AAPL",
            Resolution::Intraday,
            MockBehavior::Fail(SyncError::provider("mock", "timeout")),
        )
        .await;

    let report = f.orchestrator.run_both(["AAPL"]).await;
    assert_eq!(report.status(), RunStatus::PartiallyFailed);
    assert!(report.daily.is_ok());
    let failure = report.intraday.as_ref().expect_err("intraday fails");
    assert_eq!(failure.resolution, Some(Resolution::Intraday));
    assert_eq!(f.storage.rows("AAPL", Resolution::Daily).len(), 5);
    assert_eq!(f.alerts.messages().len(), 1);
}

#[tokio::test]
async fn both_passes_succeed_and_skip_list_persists_between_runs() {
    let f = fixture();
    f.provider
        .return_bars("AAPL", Resolution::Daily, daily_history("AAPL"))
        .await;
    f.provider
        .return_bars("OTC", Resolution::Daily, daily_history("OTC"))
        .await;
    f.provider
        .return_bars("AAPL", Resolution::Intraday, vec![bar("AAPL", ts("2024-03-01T20:59:00Z"), 3)])
        .await;

    let first = f.orchestrator.run_both(["AAPL", "OTC"]).await;
    assert_eq!(first.status(), RunStatus::Succeeded);
    let intraday = first.intraday.expect("intraday ok");
    assert_eq!(
        intraday.outcome("OTC"),
        Some(&SymbolOutcome::NoHistory { skip_listed: true })
    );
    assert!(f.orchestrator.engine().skip_list().contains("OTC"));

    f.provider.clear_calls().await;
    let second = f
        .orchestrator
        .run_pass(Resolution::Intraday, &["AAPL", "OTC"])
        .await
        .expect("second intraday pass");
    assert_eq!(second.outcome("OTC"), Some(&SymbolOutcome::Skipped));
    assert!(matches!(
        second.outcome("AAPL"),
        Some(SymbolOutcome::UpToDate { .. })
    ));
    assert_eq!(f.provider.call_count().await, 0);
}

#[tokio::test]
async fn cancelled_passes_stop_before_first_symbol_without_alerting() {
    let f = fixture();
    let handle = f.orchestrator.spawn_run(["AAPL", "MSFT"]);
    handle.cancel();
    let report = handle.join().await;

    assert_eq!(report.status(), RunStatus::Failed);
    for failure in report.failures() {
        assert_eq!(failure.error.category(), "cancelled");
        assert_eq!(failure.completed, 0);
    }
    assert_eq!(f.provider.call_count().await, 0);
    assert!(f.alerts.messages().is_empty());
}

#[test]
fn builder_requires_collaborators() {
    let err = Orchestrator::builder().build().expect_err("no source");
    assert!(matches!(err, SyncError::InvalidArg(_)));

    let (source, _provider) = MockSource::new_with_controller("mock");
    let mut cfg = barsync_core::SyncConfig::default();
    cfg.intraday_table = cfg.daily_table.clone();
    let err = Orchestrator::builder()
        .source(source)
        .storage(Arc::new(MemoryStorage::new()))
        .skip_list(Arc::new(SkipList::new(Arc::new(MemorySkipListSink::new()))))
        .config(cfg)
        .build()
        .expect_err("duplicate table names");
    assert_eq!(err.category(), "config");
}

#[tokio::test(start_paused = true)]
async fn throttle_middleware_spaces_provider_calls_across_the_pass() {
    let (source, provider) = MockSource::new_with_controller("mock");
    for s in ["AAPL", "MSFT", "TSLA"] {
        provider
            .return_bars(s, Resolution::Daily, daily_history(s))
            .await;
    }
    let orchestrator = Orchestrator::builder()
        .source(source)
        .storage(Arc::new(MemoryStorage::new()))
        .skip_list(Arc::new(SkipList::new(Arc::new(MemorySkipListSink::new()))))
        .clock(Arc::new(FixedClock::new(ts("2024-03-01T21:00:00Z"))) as Arc<dyn Clock>)
        .with_middleware(Box::new(ThrottleMiddleware {
            config: ThrottleConfig {
                min_spacing: Duration::from_secs(1),
                ..ThrottleConfig::default()
            },
        }))
        .build()
        .expect("orchestrator builds");

    let started = tokio::time::Instant::now();
    let report = orchestrator
        .run_pass(Resolution::Daily, &["AAPL", "MSFT", "TSLA"])
        .await
        .expect("pass succeeds");
    let calls = provider.call_count().await;

    assert_eq!(report.count("reloaded"), 3);
    assert!(calls >= 3);
    let spacing = u32::try_from(calls - 1).expect("small");
    assert!(started.elapsed() >= Duration::from_secs(1) * spacing);
}

/// Data source that panics on every bar fetch.
struct PanickingSource;

#[async_trait]
impl DataSource for PanickingSource {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        _resolution: Resolution,
    ) -> Result<Vec<Bar>, SyncError> {
        panic!("provider client bug while fetching {symbol}");
    }

    async fn fetch_splits(
        &self,
        _symbol: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn panicking_passes_are_alerted_once_each() {
    let alerts = Arc::new(RecordingAlertSink::new());
    let orchestrator = Orchestrator::builder()
        .source(Arc::new(PanickingSource))
        .storage(Arc::new(MemoryStorage::new()))
        .skip_list(Arc::new(SkipList::new(Arc::new(MemorySkipListSink::new()))))
        .alerts(alerts.clone() as Arc<dyn AlertSink>)
        .clock(Arc::new(FixedClock::new(ts("2024-03-01T21:00:00Z"))) as Arc<dyn Clock>)
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_both(["AAPL"]).await;
    assert_eq!(report.status(), RunStatus::Failed);
    for failure in report.failures() {
        assert_eq!(failure.error.category(), "other");
        assert!(failure.error.to_string().contains("did not complete"));
    }

    let messages = alerts.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.contains("daily_raw")));
    assert!(messages.iter().any(|m| m.contains("intraday_raw")));
}
