use std::sync::{Arc, Mutex};
use std::time::Duration;

use barsync_core::{DataSource, Resolution, SyncError};
use barsync_finnhub::FinnhubSource;
use barsync_finnhub::adapter::{
    CandlePayload, CandleRequest, FinnhubCandles, FinnhubSplits, SplitPayload,
};
use chrono::{NaiveDate, TimeZone, Utc};

fn one_candle(t: i64, volume: f64) -> CandlePayload {
    CandlePayload {
        s: "ok".into(),
        t: vec![t],
        o: vec![10.0],
        h: vec![11.0],
        l: vec![9.0],
        c: vec![10.5],
        v: vec![volume],
    }
}

fn no_splits() -> Arc<dyn FinnhubSplits> {
    <dyn FinnhubSplits>::from_fn(|_, _, _| Ok(Vec::new()))
}

#[tokio::test]
async fn overlapping_chunks_keep_first_bar_and_trim_to_window() {
    let seen: Arc<Mutex<Vec<CandleRequest>>> = Arc::default();
    let log = Arc::clone(&seen);
    let candles = <dyn FinnhubCandles>::from_fn(move |req| {
        log.lock().unwrap().push(req.clone());
        // Every chunk also reports a bar at 100 and one before the window.
        let mut p = one_candle(req.from, 1.0);
        p.t = vec![req.from, 100, -60];
        p.o = vec![10.0; 3];
        p.h = vec![11.0; 3];
        p.l = vec![9.0; 3];
        p.c = vec![10.5; 3];
        p.v = vec![req.from as f64, 999.0, 5.0];
        Ok(p)
    });
    let src = FinnhubSource::from_adapters(candles, no_splits(), Duration::from_secs(50));

    let bars = src
        .fetch_bars(
            "MSFT",
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(120, 0).unwrap(),
            Resolution::Intraday,
        )
        .await
        .expect("bars");

    let reqs = seen.lock().unwrap().clone();
    assert_eq!(
        reqs.iter().map(|r| (r.from, r.to)).collect::<Vec<_>>(),
        vec![(0, 50), (51, 101), (102, 120)]
    );
    assert!(reqs.iter().all(|r| r.resolution == "1" && r.symbol == "MSFT"));

    let ts: Vec<i64> = bars.iter().map(|b| b.ts.timestamp()).collect();
    assert_eq!(ts, vec![0, 51, 100, 102]);
    assert!(bars.iter().all(|b| b.ts.timestamp() >= 0));
}

#[tokio::test]
async fn daily_is_one_request() {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let candles = <dyn FinnhubCandles>::from_fn(move |req| {
        *counter.lock().unwrap() += 1;
        assert_eq!(req.resolution, "D");
        Ok(one_candle(86_400, 42.0))
    });
    let src = FinnhubSource::from_adapters(candles, no_splits(), Duration::from_secs(60));

    let bars = src
        .fetch_bars(
            "AAPL",
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(10 * 86_400, 0).unwrap(),
            Resolution::Daily,
        )
        .await
        .expect("bars");
    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].volume, 42);
}

#[tokio::test]
async fn adapter_errors_propagate() {
    let candles =
        <dyn FinnhubCandles>::from_fn(|_| Err(SyncError::provider("finnhub", "HTTP 502")));
    let src = FinnhubSource::from_adapters(candles, no_splits(), Duration::from_secs(60));
    let err = src
        .fetch_bars(
            "AAPL",
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(60, 0).unwrap(),
            Resolution::Intraday,
        )
        .await
        .expect_err("fails");
    assert_eq!(err, SyncError::provider("finnhub", "HTTP 502"));
}

#[tokio::test]
async fn inverted_window_is_rejected() {
    let candles = <dyn FinnhubCandles>::from_fn(|_| panic!("must not be called"));
    let src = FinnhubSource::from_adapters(candles, no_splits(), Duration::from_secs(60));
    let err = src
        .fetch_bars(
            "AAPL",
            Utc.timestamp_opt(100, 0).unwrap(),
            Utc.timestamp_opt(0, 0).unwrap(),
            Resolution::Daily,
        )
        .await
        .expect_err("inverted");
    assert!(matches!(err, SyncError::InvalidArg(_)));
}

#[tokio::test]
async fn splits_outside_window_are_dropped_and_negative_factors_rejected() {
    let splits = <dyn FinnhubSplits>::from_fn(|symbol, from, to| {
        assert_eq!(symbol, "NVDA");
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        Ok(vec![
            SplitPayload {
                symbol: "NVDA".into(),
                date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                from_factor: 1.0,
                to_factor: 10.0,
            },
            SplitPayload {
                symbol: "NVDA".into(),
                date: NaiveDate::from_ymd_opt(2021, 7, 20).unwrap(),
                from_factor: 1.0,
                to_factor: 4.0,
            },
        ])
    });
    let candles = <dyn FinnhubCandles>::from_fn(|_| Ok(CandlePayload::default()));
    let src = FinnhubSource::from_adapters(candles, splits, Duration::from_secs(60));
    let records = src
        .fetch_splits(
            "NVDA",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
        )
        .await
        .expect("splits");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_factor, 10);

    let bad = <dyn FinnhubSplits>::from_fn(|symbol, from, _| {
        Ok(vec![SplitPayload {
            symbol,
            date: from,
            from_factor: -2.0,
            to_factor: 3.0,
        }])
    });
    let candles = <dyn FinnhubCandles>::from_fn(|_| Ok(CandlePayload::default()));
    let src = FinnhubSource::from_adapters(candles, bad, Duration::from_secs(60));
    let err = src
        .fetch_splits(
            "X",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .await
        .expect_err("negative factor");
    assert_eq!(err.category(), "provider");
}
