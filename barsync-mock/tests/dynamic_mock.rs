use barsync_core::{DataSource, Resolution, StorageBackend, SyncError};
use barsync_mock::fixtures::{bar, split, ts};
use barsync_mock::{MemoryStorage, MockBehavior, MockSource, SourceCall};
use chrono::NaiveDate;

#[tokio::test]
async fn test_mock_bars_filtered_to_window() {
    let (mock, controller) = MockSource::new_with_controller("P0");
    let bars = vec![
        bar("AAPL", ts("2024-01-02T00:00:00Z"), 1),
        bar("AAPL", ts("2024-01-03T00:00:00Z"), 2),
        bar("AAPL", ts("2024-01-04T00:00:00Z"), 3),
    ];
    controller
        .return_bars("AAPL", Resolution::Daily, bars.clone())
        .await;

    let got = mock
        .fetch_bars(
            "AAPL",
            ts("2024-01-03T00:00:00Z"),
            ts("2024-01-04T00:00:00Z"),
            Resolution::Daily,
        )
        .await
        .expect("bars ok");
    assert_eq!(got, bars[1..].to_vec());

    let none = mock
        .fetch_bars(
            "AAPL",
            ts("2024-01-03T00:00:00Z"),
            ts("2024-01-04T00:00:00Z"),
            Resolution::Intraday,
        )
        .await
        .expect("bars ok");
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_mock_fail_and_call_log() {
    let (mock, controller) = MockSource::new_with_controller("P0");
    let err = SyncError::provider("P0", "boom");
    controller
        .set_splits("MSFT", MockBehavior::Fail(err.clone()))
        .await;

    let got = mock
        .fetch_splits("MSFT", ts("2024-01-01T00:00:00Z"), ts("2024-02-01T00:00:00Z"))
        .await
        .expect_err("err");
    assert_eq!(got, err);

    let calls = controller.calls_for("MSFT").await;
    assert_eq!(calls.len(), 1);
    assert!(matches!(&calls[0], SourceCall::Splits { symbol, .. } if symbol == "MSFT"));
    controller.clear_calls().await;
    assert_eq!(controller.call_count().await, 0);
}

#[tokio::test]
async fn test_mock_splits_filtered_by_date() {
    let (mock, controller) = MockSource::new_with_controller("P0");
    let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    controller
        .return_splits(
            "NVDA",
            vec![split("NVDA", d("2024-06-10"), 1, 10), split("NVDA", d("2021-07-20"), 1, 4)],
        )
        .await;
    let got = mock
        .fetch_splits("NVDA", ts("2024-06-01T00:00:00Z"), ts("2024-06-30T00:00:00Z"))
        .await
        .unwrap();
    assert_eq!(got, vec![split("NVDA", d("2024-06-10"), 1, 10)]);
}

#[tokio::test]
async fn test_memory_storage_rejects_duplicate_append_atomically() {
    let storage = MemoryStorage::new();
    let t0 = ts("2024-01-02T00:00:00Z");
    let t1 = ts("2024-01-03T00:00:00Z");
    storage
        .bulk_append(&[bar("AAPL", t0, 1)], Resolution::Daily)
        .await
        .unwrap();

    let err = storage
        .bulk_append(&[bar("AAPL", t1, 2), bar("AAPL", t0, 3)], Resolution::Daily)
        .await
        .expect_err("duplicate rejected");
    assert!(err.is_storage_write());
    assert_eq!(storage.rows("AAPL", Resolution::Daily).len(), 1);
    assert_eq!(
        storage.max_timestamp("AAPL", Resolution::Daily).await.unwrap(),
        Some(t0)
    );
    assert_eq!(
        storage.volume_at("AAPL", t0, Resolution::Daily).await.unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_memory_storage_delete_race_reports_mismatch() {
    let storage = MemoryStorage::new();
    storage.seed(
        Resolution::Intraday,
        vec![
            bar("Z", ts("2024-01-02T14:30:00Z"), 1),
            bar("Z", ts("2024-01-02T14:31:00Z"), 1),
        ],
    );
    storage.set_delete_race(true);
    let err = storage
        .delete_symbol("Z", Resolution::Intraday)
        .await
        .expect_err("race");
    assert!(matches!(
        err,
        SyncError::RowCountMismatch {
            expected: 2,
            deleted: 1,
            ..
        }
    ));
    assert_eq!(storage.rows("Z", Resolution::Intraday).len(), 2);

    storage.set_delete_race(false);
    assert_eq!(
        storage.delete_symbol("Z", Resolution::Intraday).await.unwrap(),
        2
    );
    assert!(
        storage
            .known_symbols(Resolution::Intraday)
            .await
            .unwrap()
            .is_empty()
    );
}
