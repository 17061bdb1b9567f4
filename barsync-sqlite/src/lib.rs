//! barsync-sqlite
//!
//! SQLite implementations of [`StorageBackend`](barsync_core::StorageBackend)
//! and [`SkipListSink`](barsync_core::SkipListSink).
//!
//! One database holds the daily and intraday bar tables, the split table
//! (names taken from [`SyncConfig`](barsync_core::SyncConfig)) and the
//! `intraday_skip` table. Bar timestamps are stored as UNIX seconds and
//! prices as decimal text, so values round-trip exactly.
#![warn(missing_docs)]

mod schema;
mod skiplist;
mod storage;

pub use schema::SKIP_TABLE;
pub use skiplist::SqliteSkipListSink;
pub use storage::SqliteStorage;
