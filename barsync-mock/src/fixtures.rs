//! Bar and split builders for tests.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;

use barsync_core::{Bar, SplitRecord, SplitSource};

/// Parse an RFC 3339 instant.
///
/// # Panics
/// Panics on malformed input; fixtures are static.
#[must_use]
pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 fixture timestamp")
        .with_timezone(&Utc)
}

/// A flat bar at `price` with the given volume.
#[must_use]
pub fn bar(symbol: &str, at: DateTime<Utc>, volume: u64) -> Bar {
    let price = Decimal::new(10_000, 2);
    Bar {
        symbol: symbol.to_string(),
        ts: at,
        open: price,
        high: price,
        low: price,
        close: price,
        volume,
        status: "ok".to_string(),
    }
}

/// `count` consecutive bars starting at `start`, `step` apart.
///
/// Volumes are `base_volume`, `base_volume + 1`, ... so every bar is distinct.
#[must_use]
pub fn series(symbol: &str, start: DateTime<Utc>, step: TimeDelta, count: usize, base_volume: u64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let offset = i32::try_from(i).unwrap_or(i32::MAX);
            bar(symbol, start + step * offset, base_volume + i as u64)
        })
        .collect()
}

/// A provider-confirmed split.
#[must_use]
pub fn split(symbol: &str, date: NaiveDate, from_factor: u32, to_factor: u32) -> SplitRecord {
    SplitRecord {
        symbol: symbol.to_string(),
        date,
        from_factor,
        to_factor,
        source: SplitSource::Provider,
    }
}
