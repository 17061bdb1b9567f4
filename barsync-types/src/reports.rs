//! Report envelopes produced by the engine and orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bar::SplitRecord;
use crate::error::SyncError;
use crate::resolution::Resolution;

/// Boundary-bar volume mismatch with no provider split to explain it.
///
/// Logged and reported only; storage is left untouched and the gap stays
/// open until a later run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityAnomaly {
    /// Affected symbol.
    pub symbol: String,
    /// Table resolution the mismatch was found in.
    pub resolution: Resolution,
    /// Timestamp of the boundary bar (the last stored bar).
    pub boundary: DateTime<Utc>,
    /// Volume held in storage at the boundary, if any.
    pub stored_volume: Option<u64>,
    /// Volume the provider reported at the boundary.
    pub provider_volume: u64,
    /// End of the overlap window that was checked.
    pub window_end: DateTime<Utc>,
}

/// What the engine did for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// Symbol is on the intraday skip-list; no provider call was made.
    Skipped,
    /// Gap since the last stored bar is below the freshness threshold.
    UpToDate {
        /// Hours since the last stored bar.
        gap_hours: f64,
    },
    /// The overlap fetch returned nothing beyond what is stored.
    NothingNew,
    /// New rows were appended after the last stored bar.
    Appended {
        /// Number of rows appended.
        rows: usize,
        /// False when no boundary bar was available to cross-check volumes.
        verified: bool,
    },
    /// The full history window was fetched and appended.
    Reloaded {
        /// Number of rows appended.
        rows: usize,
        /// True when prior rows were deleted first (split-triggered reload).
        purged: bool,
        /// Split records newly persisted for this reload.
        splits: Vec<SplitRecord>,
    },
    /// A full reload returned no rows.
    NoHistory {
        /// True when the symbol was added to the intraday skip-list.
        skip_listed: bool,
    },
    /// Volume mismatch without a split.
    Anomaly(DataQualityAnomaly),
}

impl SymbolOutcome {
    /// Short label for logs and counters.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::UpToDate { .. } => "up_to_date",
            Self::NothingNew => "nothing_new",
            Self::Appended { .. } => "appended",
            Self::Reloaded { .. } => "reloaded",
            Self::NoHistory { .. } => "no_history",
            Self::Anomaly(_) => "anomaly",
        }
    }

    /// Rows written to the bar table by this outcome.
    #[must_use]
    pub const fn rows_written(&self) -> usize {
        match self {
            Self::Appended { rows, .. } | Self::Reloaded { rows, .. } => *rows,
            _ => 0,
        }
    }
}

/// Outcome for a single symbol within a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    /// Symbol evaluated.
    pub symbol: String,
    /// What happened.
    pub outcome: SymbolOutcome,
}

/// Summary of a completed pass over the symbol universe for one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Resolution synchronized.
    pub resolution: Resolution,
    /// Pass start time.
    pub started_at: DateTime<Utc>,
    /// Pass end time.
    pub finished_at: DateTime<Utc>,
    /// Per-symbol outcomes in universe order.
    pub symbols: Vec<SymbolReport>,
}

impl PassReport {
    /// Number of symbols whose outcome carries `label`.
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.outcome.label() == label)
            .count()
    }

    /// Total rows written across the pass.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.symbols.iter().map(|s| s.outcome.rows_written()).sum()
    }

    /// Data-quality anomalies recorded during the pass.
    pub fn anomalies(&self) -> impl Iterator<Item = &DataQualityAnomaly> {
        self.symbols.iter().filter_map(|s| match &s.outcome {
            SymbolOutcome::Anomaly(a) => Some(a),
            _ => None,
        })
    }

    /// Outcome for `symbol`, if it was part of the pass.
    #[must_use]
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| &s.outcome)
    }
}

/// A pass that aborted on an unrecovered error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFailure {
    /// Resolution of the aborted pass; `None` when the table name did not resolve.
    pub resolution: Option<Resolution>,
    /// Bar table the pass was targeting.
    pub table: String,
    /// Pass start time.
    pub started_at: DateTime<Utc>,
    /// Time the failure was observed.
    pub failed_at: DateTime<Utc>,
    /// Symbol being evaluated when the pass failed, if any.
    pub symbol: Option<String>,
    /// Symbols completed before the failure.
    pub completed: usize,
    /// The triggering error.
    pub error: SyncError,
}

impl PassFailure {
    /// Operator alert text: table, symbol, error category, start and end time.
    #[must_use]
    pub fn alert_message(&self) -> String {
        let symbol = self.symbol.as_deref().unwrap_or("-");
        format!(
            "[barsync] {} pass failed at {symbol} ({}): {}; started {}, failed {}",
            self.table,
            self.error.category(),
            self.error,
            self.started_at.to_rfc3339(),
            self.failed_at.to_rfc3339(),
        )
    }
}

impl core::fmt::Display for PassFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.alert_message())
    }
}

impl std::error::Error for PassFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Joined outcome of the two resolution passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Both passes succeeded.
    Succeeded,
    /// Exactly one pass failed.
    PartiallyFailed,
    /// Both passes failed.
    Failed,
}

/// Result of running the daily and intraday passes side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Daily pass result.
    pub daily: Result<PassReport, PassFailure>,
    /// Intraday pass result.
    pub intraday: Result<PassReport, PassFailure>,
}

impl RunReport {
    /// Classify the joined result.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        match (self.daily.is_ok(), self.intraday.is_ok()) {
            (true, true) => RunStatus::Succeeded,
            (false, false) => RunStatus::Failed,
            _ => RunStatus::PartiallyFailed,
        }
    }

    /// Failures in pass order.
    pub fn failures(&self) -> impl Iterator<Item = &PassFailure> {
        [&self.daily, &self.intraday]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }
}
