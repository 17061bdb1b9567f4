use rusqlite::Connection;

use barsync_core::{SyncConfig, SyncError};

/// Table holding intraday skip-list entries.
pub const SKIP_TABLE: &str = "intraday_skip";

/// Validated table names for one database.
#[derive(Debug, Clone)]
pub(crate) struct Tables {
    pub daily: String,
    pub intraday: String,
    pub split: String,
}

impl Tables {
    pub(crate) fn from_config(cfg: &SyncConfig) -> Result<Self, SyncError> {
        cfg.validate()?;
        for name in [&cfg.daily_table, &cfg.intraday_table, &cfg.split_table] {
            check_identifier(name)?;
        }
        Ok(Self {
            daily: cfg.daily_table.clone(),
            intraday: cfg.intraday_table.clone(),
            split: cfg.split_table.clone(),
        })
    }
}

// Table names are interpolated into SQL text, so only plain identifiers pass.
fn check_identifier(name: &str) -> Result<(), SyncError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::Config(format!("invalid table name {name:?}")))
    }
}

pub(crate) fn create(conn: &Connection, tables: &Tables) -> Result<(), SyncError> {
    let mut ddl = String::new();
    for bars in [&tables.daily, &tables.intraday] {
        ddl.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {bars} (
                symbol TEXT NOT NULL,
                ts INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (symbol, ts)
            );"
        ));
    }
    ddl.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {split} (
            symbol TEXT NOT NULL,
            date TEXT NOT NULL,
            from_factor INTEGER NOT NULL,
            to_factor INTEGER NOT NULL,
            source TEXT NOT NULL,
            PRIMARY KEY (symbol, date)
        );
        CREATE TABLE IF NOT EXISTS {SKIP_TABLE} (
            symbol TEXT PRIMARY KEY NOT NULL,
            added_at INTEGER NOT NULL
        );",
        split = tables.split
    ));
    conn.execute_batch(&ddl)
        .map_err(|e| SyncError::storage_write(format!("schema setup failed: {e}")))
}
