use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Bar, Resolution, SplitRecord, SyncError};

/// Market-data provider the engine reconciles storage against.
///
/// Implementations enforce their own rate limits by delaying calls; they
/// should not fail spuriously because calls arrive back to back.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable provider name used in logs and `SyncError::Provider`.
    fn name(&self) -> &'static str;

    /// Fetch bars for `symbol` in the inclusive range `[from, to]`.
    ///
    /// Bars are returned in ascending timestamp order. An empty vector is a
    /// valid answer and means the provider has nothing for the window.
    async fn fetch_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Vec<Bar>, SyncError>;

    /// Fetch split events for `symbol` effective within `[from, to]`.
    async fn fetch_splits(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SplitRecord>, SyncError>;
}

/// Persistent store of bar rows and split records.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Distinct symbols currently stored for `resolution`.
    async fn known_symbols(&self, resolution: Resolution) -> Result<HashSet<String>, SyncError>;

    /// Latest stored timestamp for `symbol`, or `None` when the symbol is unseen.
    async fn max_timestamp(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// Stored volume of the bar at exactly `ts`, if such a bar exists.
    async fn volume_at(
        &self,
        symbol: &str,
        ts: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Option<u64>, SyncError>;

    /// Stored bars for `symbol` in `[from, to]`, ascending.
    async fn query_range(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SyncError>;

    /// Append `bars` atomically: either every row becomes visible or none does.
    ///
    /// # Errors
    /// Returns `SyncError::StorageWrite` when the write is rejected, including
    /// a `(symbol, ts)` key that is already stored.
    async fn bulk_append(&self, bars: &[Bar], resolution: Resolution) -> Result<(), SyncError>;

    /// Delete every stored bar for `symbol` and return the number of rows removed.
    ///
    /// # Errors
    /// Returns `SyncError::RowCountMismatch` when the deleted count differs from
    /// the count taken immediately before the delete.
    async fn delete_symbol(&self, symbol: &str, resolution: Resolution) -> Result<u64, SyncError>;

    /// Persist `record` unless one already exists for its `(symbol, date)`.
    ///
    /// Returns `true` when a new row was written.
    async fn upsert_split_record(&self, record: &SplitRecord) -> Result<bool, SyncError>;

    /// Split records for `symbol` dated within `[from, to]`.
    async fn split_records(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SplitRecord>, SyncError>;
}

/// Best-effort delivery channel for fatal run failures.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver `message` to the operator.
    async fn notify(&self, message: &str) -> Result<(), SyncError>;
}

/// Source of the current time for a pass.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
