//! barsync-core
//!
//! Collaborator traits, the skip-list store, the pure decision functions and
//! the per-symbol `SyncEngine` shared across the barsync workspace.
//!
//! - `connector`: the `DataSource`, `StorageBackend`, `AlertSink` and `Clock` seams.
//! - `decision`: side-effect free planning of what to do for one symbol.
//! - `engine`: the executor that performs the planned action.
//! - `skiplist`: the intraday no-coverage skip-list and its durable sinks.
//!
//! Async runtime (Tokio)
//! ---------------------
//! The file-backed skip-list sink uses `tokio::fs`, so code that touches it
//! must run under a Tokio 1.x runtime.
//!
#![warn(missing_docs)]

/// Alert sinks that ship with the core.
pub mod alert;
/// Collaborator traits consumed by the engine and orchestrator.
pub mod connector;
/// Pure decision functions and the `Action` they produce.
pub mod decision;
/// The per-symbol synchronization executor.
pub mod engine;
/// Middleware trait implemented by data-source wrappers.
pub mod middleware;
/// Helpers for bar series returned by providers.
pub mod series;
/// Intraday skip-list state and durable sinks.
pub mod skiplist;
pub mod types;

pub use alert::LogAlertSink;
pub use connector::{AlertSink, Clock, DataSource, StorageBackend, SystemClock};
pub use decision::{Action, NoOpReason, Step, SyncState};
pub use engine::SyncEngine;
pub use middleware::SourceMiddleware;
pub use series::merge_bars;
pub use skiplist::{FileSkipListSink, SkipList, SkipListSink};
pub use types::*;
