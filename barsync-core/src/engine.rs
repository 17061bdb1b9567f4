use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::connector::{DataSource, StorageBackend};
use crate::decision::{self, Action, NoOpReason, Step, SyncState};
use crate::skiplist::SkipList;
use crate::{Resolution, SplitRecord, SymbolOutcome, SyncConfig, SyncError};

/// Decides and performs the minimal safe action for one `(symbol, resolution)`.
///
/// Reads and provider calls happen in [`SyncEngine::decide`]; storage is only
/// mutated by [`SyncEngine::apply`] for append and reload actions (plus the
/// skip-list insert after an empty intraday reload). Provider and storage
/// errors propagate unchanged to the caller.
pub struct SyncEngine {
    source: Arc<dyn DataSource>,
    storage: Arc<dyn StorageBackend>,
    skip_list: Arc<SkipList>,
    cfg: SyncConfig,
}

impl core::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("source", &self.source.name())
            .field("skip_list", &self.skip_list.len())
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Engine over the given collaborators.
    pub fn new(
        source: Arc<dyn DataSource>,
        storage: Arc<dyn StorageBackend>,
        skip_list: Arc<SkipList>,
        cfg: SyncConfig,
    ) -> Self {
        Self {
            source,
            storage,
            skip_list,
            cfg,
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Storage backend the engine writes to.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Provider the engine reads from.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Shared intraday skip-list.
    #[must_use]
    pub fn skip_list(&self) -> &Arc<SkipList> {
        &self.skip_list
    }

    /// Build the per-run state for `symbol`.
    ///
    /// When `known` is given (the stored symbol set loaded once per pass), a
    /// symbol absent from it is treated as unseen without querying storage.
    /// Skip-listed intraday symbols never touch storage either.
    ///
    /// # Errors
    /// Propagates storage query failures.
    pub async fn load_state(
        &self,
        symbol: &str,
        resolution: Resolution,
        now: DateTime<Utc>,
        known: Option<&HashSet<String>>,
    ) -> Result<SyncState, SyncError> {
        let skip_listed = resolution.uses_skip_list() && self.skip_list.contains(symbol);
        let last_stored = if skip_listed || known.is_some_and(|k| !k.contains(symbol)) {
            None
        } else {
            self.storage.max_timestamp(symbol, resolution).await?
        };
        Ok(SyncState {
            symbol: symbol.to_string(),
            resolution,
            last_stored,
            now,
            skip_listed,
        })
    }

    /// Run the decision procedure for `state`, fetching whatever it asks for.
    ///
    /// Read-only: performs provider calls and storage reads, never writes.
    ///
    /// # Errors
    /// Propagates provider and storage query failures.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "barsync::engine::decide",
            skip(self, state),
            fields(symbol = %state.symbol, resolution = %state.resolution),
        )
    )]
    pub async fn decide(&self, state: &SyncState) -> Result<Action, SyncError> {
        let mut step = decision::plan(state, &self.cfg);
        loop {
            step = match step {
                Step::Decided(action) => return Ok(action),
                Step::FetchOverlap { from, to } => {
                    let overlap = self
                        .source
                        .fetch_bars(&state.symbol, from, to, state.resolution)
                        .await?;
                    let stored_volume = if decision::locate_boundary(&overlap, from).is_some() {
                        self.storage
                            .volume_at(&state.symbol, from, state.resolution)
                            .await?
                    } else {
                        None
                    };
                    decision::reconcile(state, overlap, stored_volume)
                }
                Step::CheckSplits { from, to, anomaly } => {
                    let splits = self.source.fetch_splits(&state.symbol, from, to).await?;
                    Step::Decided(decision::resolve_mismatch(
                        state, &self.cfg, splits, anomaly,
                    ))
                }
            };
        }
    }

    /// Perform `action` for `state` and describe what happened.
    ///
    /// For a purging reload the provider's split records are persisted first,
    /// then every stored row for the symbol is deleted, then the history window
    /// is fetched and appended. An empty reload for a skip-list resolution adds
    /// the symbol to the skip-list.
    ///
    /// # Errors
    /// Propagates provider, storage and skip-list failures. A failure after the
    /// delete leaves the symbol without rows; the next run reloads it as unseen.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "barsync::engine::apply",
            skip(self, state, action),
            fields(symbol = %state.symbol, resolution = %state.resolution),
        )
    )]
    pub async fn apply(&self, state: &SyncState, action: Action) -> Result<SymbolOutcome, SyncError> {
        let symbol = state.symbol.as_str();
        let resolution = state.resolution;
        match action {
            Action::NoOp(reason) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(symbol, ?reason, "no-op");
                Ok(match reason {
                    NoOpReason::SkipListed => SymbolOutcome::Skipped,
                    NoOpReason::BelowThreshold { gap_hours } => SymbolOutcome::UpToDate { gap_hours },
                    NoOpReason::EmptyOverlap | NoOpReason::NothingAfterBoundary => {
                        SymbolOutcome::NothingNew
                    }
                })
            }
            Action::IncrementalAppend { rows, verified } => {
                self.storage.bulk_append(&rows, resolution).await?;
                #[cfg(feature = "tracing")]
                tracing::info!(symbol, rows = rows.len(), verified, "appended");
                Ok(SymbolOutcome::Appended {
                    rows: rows.len(),
                    verified,
                })
            }
            Action::FullReload {
                from,
                to,
                purge,
                splits,
            } => self.reload(symbol, resolution, from, to, purge, splits).await,
            Action::FlagAnomaly(anomaly) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    symbol,
                    resolution = %resolution,
                    boundary = %anomaly.boundary,
                    stored_volume = ?anomaly.stored_volume,
                    provider_volume = anomaly.provider_volume,
                    "boundary volume mismatch without a provider split; storage left unchanged"
                );
                Ok(SymbolOutcome::Anomaly(anomaly))
            }
        }
    }

    /// Write the split records not yet stored for `symbol`, returning the new ones.
    async fn persist_splits(
        &self,
        symbol: &str,
        splits: Vec<SplitRecord>,
    ) -> Result<Vec<SplitRecord>, SyncError> {
        let (Some(lo), Some(hi)) = (
            splits.iter().map(|s| s.date).min(),
            splits.iter().map(|s| s.date).max(),
        ) else {
            return Ok(Vec::new());
        };
        let recorded: HashSet<NaiveDate> = self
            .storage
            .split_records(symbol, lo, hi)
            .await?
            .into_iter()
            .map(|r| r.date)
            .collect();
        let mut persisted = Vec::with_capacity(splits.len());
        for split in splits {
            if recorded.contains(&split.date) {
                #[cfg(feature = "tracing")]
                tracing::debug!(symbol, date = %split.date, "split already recorded");
                continue;
            }
            if self.storage.upsert_split_record(&split).await? {
                persisted.push(split);
            }
        }
        Ok(persisted)
    }

    async fn reload(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        purge: bool,
        splits: Vec<SplitRecord>,
    ) -> Result<SymbolOutcome, SyncError> {
        let persisted = self.persist_splits(symbol, splits).await?;
        if purge {
            let _deleted = self.storage.delete_symbol(symbol, resolution).await?;
            #[cfg(feature = "tracing")]
            tracing::info!(symbol, resolution = %resolution, deleted = _deleted, "purged for reload");
        }
        let rows = self.source.fetch_bars(symbol, from, to, resolution).await?;
        if rows.is_empty() {
            let skip_listed = resolution.uses_skip_list() && self.skip_list.insert(symbol).await?;
            #[cfg(feature = "tracing")]
            {
                if skip_listed {
                    tracing::info!(symbol, "no intraday history; added to skip-list");
                } else {
                    tracing::debug!(symbol, resolution = %resolution, "reload returned no history");
                }
            }
            return Ok(SymbolOutcome::NoHistory { skip_listed });
        }
        self.storage.bulk_append(&rows, resolution).await?;
        #[cfg(feature = "tracing")]
        tracing::info!(symbol, resolution = %resolution, rows = rows.len(), purge, "reloaded");
        Ok(SymbolOutcome::Reloaded {
            rows: rows.len(),
            purged: purge,
            splits: persisted,
        })
    }

    /// Evaluate and synchronize one symbol.
    ///
    /// # Errors
    /// Propagates provider, storage and skip-list failures.
    pub async fn sync_symbol(
        &self,
        symbol: &str,
        resolution: Resolution,
        now: DateTime<Utc>,
        known: Option<&HashSet<String>>,
    ) -> Result<SymbolOutcome, SyncError> {
        let state = self.load_state(symbol, resolution, now, known).await?;
        let action = self.decide(&state).await?;
        self.apply(&state, action).await
    }
}
