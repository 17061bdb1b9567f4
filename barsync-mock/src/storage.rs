use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use barsync_core::connector::StorageBackend;
use barsync_core::{Bar, Resolution, SplitRecord, SyncError};

type Table = BTreeMap<(String, DateTime<Utc>), Bar>;

#[derive(Default)]
struct Inner {
    tables: HashMap<Resolution, Table>,
    splits: BTreeMap<(String, NaiveDate), SplitRecord>,
    fail_writes: Option<SyncError>,
    fail_queries: Option<SyncError>,
    delete_race: bool,
    writes: usize,
}

/// In-memory `StorageBackend` with failure injection.
///
/// Appends are all-or-nothing and reject keys that are already stored, so
/// duplicate writes surface as `StorageWrite` errors in tests.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert rows directly, replacing any existing row with the same key.
    pub fn seed(&self, resolution: Resolution, bars: impl IntoIterator<Item = Bar>) {
        let mut inner = self.lock();
        let table = inner.tables.entry(resolution).or_default();
        for b in bars {
            table.insert((b.symbol.clone(), b.ts), b);
        }
    }

    /// Insert a split record directly.
    pub fn seed_split(&self, record: SplitRecord) {
        self.lock()
            .splits
            .insert((record.symbol.clone(), record.date), record);
    }

    /// Stored rows for `symbol`, ascending.
    #[must_use]
    pub fn rows(&self, symbol: &str, resolution: Resolution) -> Vec<Bar> {
        self.lock()
            .tables
            .get(&resolution)
            .map(|t| {
                t.values()
                    .filter(|b| b.symbol == symbol)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every stored row for `resolution`, ordered by `(symbol, ts)`.
    #[must_use]
    pub fn snapshot(&self, resolution: Resolution) -> Vec<Bar> {
        self.lock()
            .tables
            .get(&resolution)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every stored split record, ordered by `(symbol, date)`.
    #[must_use]
    pub fn splits(&self) -> Vec<SplitRecord> {
        self.lock().splits.values().cloned().collect()
    }

    /// Number of successful mutating calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Make every subsequent write fail with `err` (or succeed again with `None`).
    pub fn fail_writes(&self, err: Option<SyncError>) {
        self.lock().fail_writes = err;
    }

    /// Make every subsequent read fail with `err` (or succeed again with `None`).
    pub fn fail_queries(&self, err: Option<SyncError>) {
        self.lock().fail_queries = err;
    }

    /// Simulate a concurrent writer: deletes report one row fewer than counted.
    pub fn set_delete_race(&self, on: bool) {
        self.lock().delete_race = on;
    }

    fn check_query(inner: &Inner) -> Result<(), SyncError> {
        inner.fail_queries.clone().map_or(Ok(()), Err)
    }

    fn check_write(inner: &Inner) -> Result<(), SyncError> {
        inner.fail_writes.clone().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn known_symbols(&self, resolution: Resolution) -> Result<HashSet<String>, SyncError> {
        let inner = self.lock();
        Self::check_query(&inner)?;
        Ok(inner
            .tables
            .get(&resolution)
            .map(|t| t.keys().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default())
    }

    async fn max_timestamp(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let inner = self.lock();
        Self::check_query(&inner)?;
        Ok(inner.tables.get(&resolution).and_then(|t| {
            t.keys()
                .filter(|(s, _)| s == symbol)
                .map(|(_, ts)| *ts)
                .max()
        }))
    }

    async fn volume_at(
        &self,
        symbol: &str,
        ts: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Option<u64>, SyncError> {
        let inner = self.lock();
        Self::check_query(&inner)?;
        Ok(inner
            .tables
            .get(&resolution)
            .and_then(|t| t.get(&(symbol.to_string(), ts)))
            .map(|b| b.volume))
    }

    async fn query_range(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SyncError> {
        let inner = self.lock();
        Self::check_query(&inner)?;
        Ok(inner
            .tables
            .get(&resolution)
            .map(|t| {
                t.range((symbol.to_string(), from)..=(symbol.to_string(), to))
                    .map(|(_, b)| b.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn bulk_append(&self, bars: &[Bar], resolution: Resolution) -> Result<(), SyncError> {
        let mut inner = self.lock();
        Self::check_write(&inner)?;
        let table = inner.tables.entry(resolution).or_default();
        let mut batch = HashSet::with_capacity(bars.len());
        for b in bars {
            let key = (b.symbol.clone(), b.ts);
            if table.contains_key(&key) || !batch.insert(key) {
                return Err(SyncError::storage_write(format!(
                    "duplicate key ({}, {})",
                    b.symbol, b.ts
                )));
            }
        }
        for b in bars {
            table.insert((b.symbol.clone(), b.ts), b.clone());
        }
        inner.writes += 1;
        Ok(())
    }

    async fn delete_symbol(&self, symbol: &str, resolution: Resolution) -> Result<u64, SyncError> {
        let mut inner = self.lock();
        Self::check_write(&inner)?;
        let race = inner.delete_race;
        let table = inner.tables.entry(resolution).or_default();
        let expected = table.keys().filter(|(s, _)| s == symbol).count() as u64;
        let deleted = if race { expected.saturating_sub(1) } else { expected };
        if deleted != expected {
            return Err(SyncError::RowCountMismatch {
                symbol: symbol.to_string(),
                table: resolution.to_string(),
                expected,
                deleted,
            });
        }
        table.retain(|(s, _), _| s != symbol);
        inner.writes += 1;
        Ok(deleted)
    }

    async fn upsert_split_record(&self, record: &SplitRecord) -> Result<bool, SyncError> {
        let mut inner = self.lock();
        Self::check_write(&inner)?;
        let key = (record.symbol.clone(), record.date);
        if inner.splits.contains_key(&key) {
            return Ok(false);
        }
        inner.splits.insert(key, record.clone());
        inner.writes += 1;
        Ok(true)
    }

    async fn split_records(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        let inner = self.lock();
        Self::check_query(&inner)?;
        Ok(inner
            .splits
            .range((symbol.to_string(), from)..=(symbol.to_string(), to))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
