use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params};

use barsync_core::{SkipListSink, SyncError};

use crate::schema::SKIP_TABLE;

/// Skip-list entries kept in the `intraday_skip` table.
#[derive(Clone)]
pub struct SqliteSkipListSink {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteSkipListSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSkipListSink").finish_non_exhaustive()
    }
}

impl SqliteSkipListSink {
    pub(crate) const fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&guard).map_err(|e| SyncError::SkipList(e.to_string()))
        })
        .await
        .map_err(|e| SyncError::SkipList(format!("sqlite task did not complete: {e}")))?
    }
}

#[async_trait]
impl SkipListSink for SqliteSkipListSink {
    async fn load(&self) -> Result<Vec<String>, SyncError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT symbol FROM {SKIP_TABLE} ORDER BY added_at, rowid"
            ))?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }

    async fn append(&self, symbol: &str) -> Result<(), SyncError> {
        let symbol = symbol.to_string();
        let added_at = Utc::now().timestamp();
        self.run(move |conn| {
            conn.execute(
                &format!("INSERT OR IGNORE INTO {SKIP_TABLE} (symbol, added_at) VALUES (?1, ?2)"),
                params![symbol, added_at],
            )
            .map(|_| ())
        })
        .await
    }
}
