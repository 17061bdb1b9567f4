use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use barsync_core::{PassFailure, PassReport, Resolution, SymbolReport, SyncError};

use crate::Orchestrator;

/// Where a pass stopped, used to build its `PassFailure`.
struct Abort {
    symbol: Option<String>,
    completed: usize,
    error: SyncError,
}

impl Orchestrator {
    /// Synchronize every symbol of `universe` for one resolution, in order.
    ///
    /// Symbols are processed strictly sequentially. The first provider, storage
    /// or skip-list error aborts the pass; the failure is forwarded once to the
    /// alert sink and returned. Data-quality anomalies are recorded in the
    /// report and do not abort.
    ///
    /// # Errors
    /// Returns a `PassFailure` describing the triggering error, the symbol being
    /// evaluated and how many symbols completed before it. A universe that lists
    /// a symbol twice fails with `InvalidArg` before any symbol is touched.
    pub async fn run_pass<S: AsRef<str>>(
        &self,
        resolution: Resolution,
        universe: &[S],
    ) -> Result<PassReport, PassFailure> {
        self.run_pass_until(resolution, universe, &AtomicBool::new(false))
            .await
    }

    /// Like [`run_pass`](Self::run_pass), addressing the pass by bar table name.
    ///
    /// # Errors
    /// A name that is neither the daily nor the intraday table fails with
    /// `UnsupportedResolution` before any symbol is touched; otherwise as
    /// [`run_pass`](Self::run_pass).
    pub async fn run_table<S: AsRef<str>>(
        &self,
        table: &str,
        universe: &[S],
    ) -> Result<PassReport, PassFailure> {
        match self.config().resolution_for_table(table) {
            Ok(resolution) => self.run_pass(resolution, universe).await,
            Err(error) => {
                let now = self.clock.now();
                Err(self
                    .escalate(PassFailure {
                        resolution: None,
                        table: table.to_string(),
                        started_at: now,
                        failed_at: now,
                        symbol: None,
                        completed: 0,
                        error,
                    })
                    .await)
            }
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "barsync::pass",
            skip(self, universe, cancel),
            fields(resolution = %resolution, symbols = universe.len()),
        )
    )]
    pub(crate) async fn run_pass_until<S: AsRef<str>>(
        &self,
        resolution: Resolution,
        universe: &[S],
        cancel: &AtomicBool,
    ) -> Result<PassReport, PassFailure> {
        let started_at = self.clock.now();
        match self.sync_universe(resolution, universe, cancel).await {
            Ok(symbols) => {
                let finished_at = self.clock.now();
                #[cfg(feature = "tracing")]
                tracing::info!(
                    resolution = %resolution,
                    symbols = symbols.len(),
                    elapsed_ms = (finished_at - started_at).num_milliseconds(),
                    "pass finished"
                );
                Ok(PassReport {
                    resolution,
                    started_at,
                    finished_at,
                    symbols,
                })
            }
            Err(abort) => {
                let failure = self.failure(resolution, started_at, abort);
                if matches!(failure.error, SyncError::Cancelled { .. }) {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        resolution = %resolution,
                        completed = failure.completed,
                        "pass cancelled"
                    );
                    return Err(failure);
                }
                Err(self.escalate(failure).await)
            }
        }
    }

    async fn sync_universe<S: AsRef<str>>(
        &self,
        resolution: Resolution,
        universe: &[S],
        cancel: &AtomicBool,
    ) -> Result<Vec<SymbolReport>, Abort> {
        let mut seen = HashSet::with_capacity(universe.len());
        if let Some(dup) = universe.iter().map(AsRef::as_ref).find(|s| !seen.insert(*s)) {
            return Err(Abort {
                symbol: Some(dup.to_string()),
                completed: 0,
                error: SyncError::InvalidArg(format!("symbol {dup} listed twice in universe")),
            });
        }

        let known = self
            .engine
            .storage()
            .known_symbols(resolution)
            .await
            .map_err(|error| Abort {
                symbol: None,
                completed: 0,
                error,
            })?;

        let total = universe.len();
        let mut reports = Vec::with_capacity(total);
        for symbol in universe.iter().map(AsRef::as_ref) {
            if cancel.load(Ordering::Acquire) {
                return Err(Abort {
                    symbol: None,
                    completed: reports.len(),
                    error: SyncError::Cancelled { resolution },
                });
            }
            #[cfg(feature = "tracing")]
            tracing::info!(symbol, position = reports.len() + 1, total, "syncing");
            let outcome = self
                .engine
                .sync_symbol(symbol, resolution, self.clock.now(), Some(&known))
                .await
                .map_err(|error| Abort {
                    symbol: Some(symbol.to_string()),
                    completed: reports.len(),
                    error,
                })?;
            reports.push(SymbolReport {
                symbol: symbol.to_string(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn failure(&self, resolution: Resolution, started_at: DateTime<Utc>, abort: Abort) -> PassFailure {
        PassFailure {
            resolution: Some(resolution),
            table: self.config().table(resolution).to_string(),
            started_at,
            failed_at: self.clock.now(),
            symbol: abort.symbol,
            completed: abort.completed,
            error: abort.error,
        }
    }

    /// Log `failure` and forward it to the alert sink. Delivery errors are
    /// logged and never replace the original failure.
    pub(crate) async fn escalate(&self, failure: PassFailure) -> PassFailure {
        let message = failure.alert_message();
        #[cfg(feature = "tracing")]
        tracing::error!(
            table = %failure.table,
            symbol = ?failure.symbol,
            category = failure.error.category(),
            error = %failure.error,
            "pass failed"
        );
        if let Err(_e) = self.alerts.notify(&message).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "alert delivery failed");
        }
        failure
    }
}
