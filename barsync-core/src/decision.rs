//! Side-effect free planning for one `(symbol, resolution)` pair.
//!
//! The engine alternates between these functions and its collaborators:
//!
//! 1. [`plan`] looks only at the stored state and the clock. It either decides
//!    outright or asks for the overlap window to be fetched.
//! 2. [`reconcile`] inspects the overlap fetch and the stored boundary volume.
//!    It either decides or asks for the split events over the gap.
//! 3. [`resolve_mismatch`] turns the split answer into a reload or an anomaly.
//!
//! Nothing here performs I/O, so every branch is unit-testable with plain values.

use chrono::{DateTime, TimeDelta, Utc};

use crate::series::{position_of, strictly_after};
use crate::{Bar, DataQualityAnomaly, Resolution, SplitRecord, SyncConfig};

/// Inputs for one symbol's evaluation, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Symbol being evaluated.
    pub symbol: String,
    /// Resolution being synchronized.
    pub resolution: Resolution,
    /// Latest stored timestamp; `None` when the symbol was never stored.
    pub last_stored: Option<DateTime<Utc>>,
    /// Current time for this pass.
    pub now: DateTime<Utc>,
    /// Whether the symbol is on the intraday skip-list.
    pub skip_listed: bool,
}

impl SyncState {
    /// Time elapsed since the last stored bar.
    #[must_use]
    pub fn gap(&self) -> Option<TimeDelta> {
        self.last_stored.map(|last| self.now - last)
    }

    /// Elapsed time in fractional hours.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gap_hours(&self) -> Option<f64> {
        self.gap().map(|g| g.num_milliseconds() as f64 / 3_600_000.0)
    }
}

/// Why nothing was written.
#[derive(Debug, Clone, PartialEq)]
pub enum NoOpReason {
    /// Intraday symbol without provider coverage.
    SkipListed,
    /// The stored series is fresher than the resolution's threshold.
    BelowThreshold {
        /// Hours since the last stored bar.
        gap_hours: f64,
    },
    /// The provider returned nothing for the overlap window.
    EmptyOverlap,
    /// The boundary bar matched and nothing followed it.
    NothingAfterBoundary,
}

/// What the executor should do for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Leave storage untouched.
    NoOp(NoOpReason),
    /// Append `rows` to the stored series.
    IncrementalAppend {
        /// Rows to append, in provider order.
        rows: Vec<Bar>,
        /// False when no boundary bar was available to cross-check.
        verified: bool,
    },
    /// Fetch `[from, to]` and append it, after deleting prior rows when `purge` is set.
    FullReload {
        /// Start of the history window.
        from: DateTime<Utc>,
        /// End of the history window.
        to: DateTime<Utc>,
        /// Delete every stored row for the symbol first.
        purge: bool,
        /// Split records to persist: the provider events that justified the
        /// purge, then the locally detected placeholder.
        splits: Vec<SplitRecord>,
    },
    /// Record a volume mismatch and leave storage untouched.
    FlagAnomaly(DataQualityAnomaly),
}

impl Action {
    /// Whether applying this action can mutate storage.
    #[must_use]
    pub const fn mutates_storage(&self) -> bool {
        matches!(self, Self::IncrementalAppend { .. } | Self::FullReload { .. })
    }
}

/// Result of a planning stage: either a final action or the next read to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Planning is finished.
    Decided(Action),
    /// Fetch provider bars for `[from, to]` and call [`reconcile`].
    FetchOverlap {
        /// The last stored timestamp.
        from: DateTime<Utc>,
        /// Current time.
        to: DateTime<Utc>,
    },
    /// Fetch provider splits for `[from, to]` and call [`resolve_mismatch`].
    CheckSplits {
        /// The last stored timestamp.
        from: DateTime<Utc>,
        /// Current time.
        to: DateTime<Utc>,
        /// The mismatch to report if no split explains it.
        anomaly: DataQualityAnomaly,
    },
}

fn to_delta(d: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

fn full_reload(state: &SyncState, cfg: &SyncConfig, purge: bool, splits: Vec<SplitRecord>) -> Action {
    let history = to_delta(cfg.history(state.resolution));
    Action::FullReload {
        from: state
            .now
            .checked_sub_signed(history)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        to: state.now,
        purge,
        splits,
    }
}

/// First planning stage, from stored state and the clock alone.
#[must_use]
pub fn plan(state: &SyncState, cfg: &SyncConfig) -> Step {
    if state.resolution.uses_skip_list() && state.skip_listed {
        return Step::Decided(Action::NoOp(NoOpReason::SkipListed));
    }
    let Some(last) = state.last_stored else {
        return Step::Decided(full_reload(state, cfg, false, Vec::new()));
    };
    let gap = state.now - last;
    if gap < to_delta(cfg.threshold(state.resolution)) {
        return Step::Decided(Action::NoOp(NoOpReason::BelowThreshold {
            gap_hours: state.gap_hours().unwrap_or_default(),
        }));
    }
    Step::FetchOverlap {
        from: last,
        to: state.now,
    }
}

/// Index of the boundary bar (timestamp equal to the last stored one) in `overlap`.
#[must_use]
pub fn locate_boundary(overlap: &[Bar], last_stored: DateTime<Utc>) -> Option<usize> {
    position_of(overlap, last_stored)
}

/// Second planning stage, from the overlap fetch.
///
/// `stored_volume` is the stored volume at the boundary; it is only consulted
/// when `overlap` contains a boundary bar. A missing stored row counts as a
/// mismatch.
#[must_use]
pub fn reconcile(state: &SyncState, overlap: Vec<Bar>, stored_volume: Option<u64>) -> Step {
    let Some(last) = state.last_stored else {
        return Step::Decided(Action::NoOp(NoOpReason::EmptyOverlap));
    };
    if overlap.is_empty() {
        return Step::Decided(Action::NoOp(NoOpReason::EmptyOverlap));
    }
    let Some(idx) = locate_boundary(&overlap, last) else {
        return Step::Decided(Action::IncrementalAppend {
            rows: overlap,
            verified: false,
        });
    };
    let provider_volume = overlap[idx].volume;
    if stored_volume == Some(provider_volume) {
        let rows = strictly_after(overlap, last);
        if rows.is_empty() {
            return Step::Decided(Action::NoOp(NoOpReason::NothingAfterBoundary));
        }
        return Step::Decided(Action::IncrementalAppend {
            rows,
            verified: true,
        });
    }
    Step::CheckSplits {
        from: last,
        to: state.now,
        anomaly: DataQualityAnomaly {
            symbol: state.symbol.clone(),
            resolution: state.resolution,
            boundary: last,
            stored_volume,
            provider_volume,
            window_end: state.now,
        },
    }
}

/// Final planning stage after a volume mismatch.
///
/// Any provider split over the gap escalates to a purge-and-reload; otherwise
/// the mismatch is reported as a data-quality anomaly and nothing is written.
/// A reload also carries a `0/0` detected record dated at the boundary, after
/// the provider records so a provider record for the same day wins.
#[must_use]
pub fn resolve_mismatch(
    state: &SyncState,
    cfg: &SyncConfig,
    mut splits: Vec<SplitRecord>,
    anomaly: DataQualityAnomaly,
) -> Action {
    if splits.is_empty() {
        return Action::FlagAnomaly(anomaly);
    }
    splits.push(SplitRecord::detected(
        anomaly.symbol,
        anomaly.boundary.date_naive(),
    ));
    full_reload(state, cfg, true, splits)
}
