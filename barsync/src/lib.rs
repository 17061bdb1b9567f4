//! barsync keeps a store of daily and intraday OHLCV bars in step with a
//! market-data provider.
//!
//! Overview
//! - For each symbol, the [`SyncEngine`](barsync_core::SyncEngine) decides between
//!   a no-op, an incremental append, a full reload, or flagging a data-quality
//!   anomaly, and performs it.
//! - The [`Orchestrator`] drives the engine across a symbol universe, one pass per
//!   resolution, strictly in universe order within a pass.
//! - The daily and intraday passes can run side by side as two cancellable tasks
//!   joined into a [`RunReport`](barsync_core::RunReport).
//!
//! Key behaviors and trade-offs
//! - Split detection: the last stored bar is re-fetched with every incremental
//!   update. A volume change at that bar plus a provider split over the gap
//!   triggers a purge and reload of the symbol's full history window.
//! - A volume change without a provider split is reported and left alone; the gap
//!   stays open until a later run.
//! - When the provider's answer does not contain the last stored bar, the new rows
//!   are appended without a volume cross-check.
//! - An intraday reload that returns nothing puts the symbol on the skip-list;
//!   it is never fetched again until removed by hand.
//! - Failures: the first provider or storage error aborts the pass. One alert is
//!   sent per failed pass; there is no retry or resume.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use barsync::Orchestrator;
//! use barsync_core::{FileSkipListSink, SkipList};
//!
//! let skip = SkipList::load(Arc::new(FileSkipListSink::new("intraday_skip.txt"))).await?;
//! let orchestrator = Orchestrator::builder()
//!     .source(source)
//!     .storage(storage)
//!     .skip_list(Arc::new(skip))
//!     .build()?;
//!
//! let handle = orchestrator.spawn_run(["AAPL", "MSFT"]);
//! let report = handle.join().await;
//! if report.status() != barsync_core::RunStatus::Succeeded {
//!     std::process::exit(1);
//! }
//! ```
#![warn(missing_docs)]

mod core;
mod pass;
mod run;

pub use crate::core::{Orchestrator, OrchestratorBuilder};
pub use run::{PassHandle, RunHandle};

pub use barsync_types::{PassFailure, PassReport, RunReport, RunStatus, SymbolOutcome};
