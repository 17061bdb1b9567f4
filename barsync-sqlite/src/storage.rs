use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use barsync_core::{
    Bar, Resolution, SplitRecord, SplitSource, StorageBackend, SyncConfig, SyncError,
};

use crate::schema::{self, Tables};
use crate::skiplist::SqliteSkipListSink;

/// Bar and split storage in a single SQLite database.
///
/// All statements run on Tokio's blocking pool against one shared
/// connection; writes are serialized by its mutex.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    tables: Arc<Tables>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and ensure every table exists.
    ///
    /// # Errors
    /// Returns `Config` for unusable table names and `StorageWrite` when the
    /// database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>, cfg: &SyncConfig) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            SyncError::storage_write(format!("cannot open {}: {e}", path.display()))
        })?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get::<_, String>(0))
            .and_then(|_| conn.pragma_update(None, "synchronous", "NORMAL"))
            .map_err(|e| SyncError::storage_write(format!("pragma setup failed: {e}")))?;
        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), "sqlite storage opened");
        Self::from_connection(conn, cfg)
    }

    /// Private in-memory database, mostly for tests and dry runs.
    ///
    /// # Errors
    /// As [`open`](Self::open).
    pub fn open_in_memory(cfg: &SyncConfig) -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::storage_write(format!("cannot open in-memory db: {e}")))?;
        Self::from_connection(conn, cfg)
    }

    /// Wrap an already open connection, creating missing tables.
    ///
    /// # Errors
    /// As [`open`](Self::open).
    pub fn from_connection(conn: Connection, cfg: &SyncConfig) -> Result<Self, SyncError> {
        let tables = Tables::from_config(cfg)?;
        schema::create(&conn, &tables)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tables: Arc::new(tables),
        })
    }

    /// Skip-list sink stored in the same database.
    #[must_use]
    pub fn skip_list_sink(&self) -> SqliteSkipListSink {
        SqliteSkipListSink::new(Arc::clone(&self.conn))
    }

    fn bar_table(&self, resolution: Resolution) -> String {
        match resolution {
            Resolution::Daily => self.tables.daily.clone(),
            Resolution::Intraday => self.tables.intraday.clone(),
        }
    }

    /// Run `f` on the blocking pool with exclusive access to the connection.
    async fn run<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SyncError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| SyncError::Other(format!("sqlite task did not complete: {e}")))?
    }
}

fn query_err(e: rusqlite::Error) -> SyncError {
    SyncError::storage_query(e.to_string())
}

fn write_err(e: rusqlite::Error) -> SyncError {
    SyncError::storage_write(e.to_string())
}

fn to_ts(secs: i64) -> Result<DateTime<Utc>, SyncError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| SyncError::storage_query(format!("stored timestamp {secs} out of range")))
}

fn decimal(raw: &str) -> Result<Decimal, SyncError> {
    Decimal::from_str(raw)
        .map_err(|e| SyncError::storage_query(format!("stored price {raw:?} unreadable: {e}")))
}

// Raw columns of one bar row, decoded outside the rusqlite callback.
struct RawBar {
    symbol: String,
    ts: i64,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: i64,
    status: String,
}

impl RawBar {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            symbol: row.get(0)?,
            ts: row.get(1)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn into_bar(self) -> Result<Bar, SyncError> {
        Ok(Bar {
            ts: to_ts(self.ts)?,
            open: decimal(&self.open)?,
            high: decimal(&self.high)?,
            low: decimal(&self.low)?,
            close: decimal(&self.close)?,
            volume: u64::try_from(self.volume).map_err(|_| {
                SyncError::storage_query(format!("negative stored volume {}", self.volume))
            })?,
            symbol: self.symbol,
            status: self.status,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn known_symbols(&self, resolution: Resolution) -> Result<HashSet<String>, SyncError> {
        let table = self.bar_table(resolution);
        self.run(move |conn| {
            let mut stmt = conn
                .prepare_cached(&format!("SELECT DISTINCT symbol FROM {table}"))
                .map_err(query_err)?;
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))
                .map_err(query_err)?;
            rows.collect::<Result<HashSet<_>, _>>().map_err(query_err)
        })
        .await
    }

    async fn max_timestamp(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let table = self.bar_table(resolution);
        let symbol = symbol.to_string();
        self.run(move |conn| {
            let max: Option<i64> = conn
                .query_row(
                    &format!("SELECT MAX(ts) FROM {table} WHERE symbol = ?1"),
                    params![symbol],
                    |r| r.get(0),
                )
                .map_err(query_err)?;
            max.map(to_ts).transpose()
        })
        .await
    }

    async fn volume_at(
        &self,
        symbol: &str,
        ts: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Option<u64>, SyncError> {
        let table = self.bar_table(resolution);
        let symbol = symbol.to_string();
        self.run(move |conn| {
            let volume: Option<i64> = conn
                .query_row(
                    &format!("SELECT volume FROM {table} WHERE symbol = ?1 AND ts = ?2"),
                    params![symbol, ts.timestamp()],
                    |r| r.get(0),
                )
                .optional()
                .map_err(query_err)?;
            volume
                .map(|v| {
                    u64::try_from(v).map_err(|_| {
                        SyncError::storage_query(format!("negative stored volume {v}"))
                    })
                })
                .transpose()
        })
        .await
    }

    async fn query_range(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SyncError> {
        let table = self.bar_table(resolution);
        let symbol = symbol.to_string();
        self.run(move |conn| {
            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT symbol, ts, open, high, low, close, volume, status FROM {table}
                     WHERE symbol = ?1 AND ts BETWEEN ?2 AND ?3 ORDER BY ts"
                ))
                .map_err(query_err)?;
            let rows = stmt
                .query_map(
                    params![symbol, from.timestamp(), to.timestamp()],
                    RawBar::from_row,
                )
                .map_err(query_err)?;
            rows.map(|r| r.map_err(query_err).and_then(RawBar::into_bar))
                .collect()
        })
        .await
    }

    async fn bulk_append(&self, bars: &[Bar], resolution: Resolution) -> Result<(), SyncError> {
        if bars.is_empty() {
            return Ok(());
        }
        let table = self.bar_table(resolution);
        let bars = bars.to_vec();
        self.run(move |conn| {
            // Dropping the transaction on any error rolls every row back.
            let tx = conn.transaction().map_err(write_err)?;
            {
                let mut stmt = tx
                    .prepare_cached(&format!(
                        "INSERT INTO {table} (symbol, ts, open, high, low, close, volume, status)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                    ))
                    .map_err(write_err)?;
                for b in &bars {
                    let volume = i64::try_from(b.volume).map_err(|_| {
                        SyncError::storage_write(format!("volume {} does not fit", b.volume))
                    })?;
                    stmt.execute(params![
                        b.symbol,
                        b.ts.timestamp(),
                        b.open.to_string(),
                        b.high.to_string(),
                        b.low.to_string(),
                        b.close.to_string(),
                        volume,
                        b.status,
                    ])
                    .map_err(|e| {
                        SyncError::storage_write(format!(
                            "insert ({}, {}) failed: {e}",
                            b.symbol, b.ts
                        ))
                    })?;
                }
            }
            tx.commit().map_err(write_err)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(table = %table, rows = bars.len(), "bars appended");
            Ok(())
        })
        .await
    }

    async fn delete_symbol(&self, symbol: &str, resolution: Resolution) -> Result<u64, SyncError> {
        let table = self.bar_table(resolution);
        let symbol = symbol.to_string();
        self.run(move |conn| {
            let tx = conn.transaction().map_err(write_err)?;
            let expected: i64 = tx
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE symbol = ?1"),
                    params![symbol],
                    |r| r.get(0),
                )
                .map_err(write_err)?;
            let deleted = tx
                .execute(&format!("DELETE FROM {table} WHERE symbol = ?1"), params![symbol])
                .map_err(write_err)?;
            let expected = u64::try_from(expected).unwrap_or_default();
            let deleted = u64::try_from(deleted).unwrap_or(u64::MAX);
            if expected != deleted {
                return Err(SyncError::RowCountMismatch {
                    symbol,
                    table,
                    expected,
                    deleted,
                });
            }
            tx.commit().map_err(write_err)?;
            Ok(deleted)
        })
        .await
    }

    async fn upsert_split_record(&self, record: &SplitRecord) -> Result<bool, SyncError> {
        let table = self.tables.split.clone();
        let record = record.clone();
        self.run(move |conn| {
            let written = conn
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO {table} (symbol, date, from_factor, to_factor, source)
                         VALUES (?1, ?2, ?3, ?4, ?5)"
                    ),
                    params![
                        record.symbol,
                        record.date.format("%Y-%m-%d").to_string(),
                        record.from_factor,
                        record.to_factor,
                        record.source.as_str(),
                    ],
                )
                .map_err(write_err)?;
            Ok(written > 0)
        })
        .await
    }

    async fn split_records(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        let table = self.tables.split.clone();
        let symbol = symbol.to_string();
        self.run(move |conn| {
            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT symbol, date, from_factor, to_factor, source FROM {table}
                     WHERE symbol = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date"
                ))
                .map_err(query_err)?;
            let rows = stmt
                .query_map(
                    params![
                        symbol,
                        from.format("%Y-%m-%d").to_string(),
                        to.format("%Y-%m-%d").to_string()
                    ],
                    |r| {
                        Ok((
                            r.get::<_, String>(0)?,
                            r.get::<_, String>(1)?,
                            r.get::<_, u32>(2)?,
                            r.get::<_, u32>(3)?,
                            r.get::<_, String>(4)?,
                        ))
                    },
                )
                .map_err(query_err)?;
            rows.map(|row| {
                let (symbol, date, from_factor, to_factor, source) = row.map_err(query_err)?;
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                    SyncError::storage_query(format!("stored split date {date:?} unreadable: {e}"))
                })?;
                let source = SplitSource::parse(&source).ok_or_else(|| {
                    SyncError::storage_query(format!("unknown split source {source:?}"))
                })?;
                Ok(SplitRecord {
                    symbol,
                    date,
                    from_factor,
                    to_factor,
                    source,
                })
            })
            .collect()
        })
        .await
    }
}
