//! Configuration types shared by the engine, orchestrator and adapters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::resolution::Resolution;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Thresholds, history windows and table names for a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum gap since the last stored daily bar before the provider is consulted.
    pub daily_threshold: Duration,
    /// Minimum gap since the last stored intraday bar before the provider is consulted.
    pub intraday_threshold: Duration,
    /// History window fetched when a daily series is (re)loaded from scratch.
    pub daily_history: Duration,
    /// History window fetched when an intraday series is (re)loaded from scratch.
    pub intraday_history: Duration,
    /// Table holding daily bars.
    pub daily_table: String,
    /// Table holding intraday bars.
    pub intraday_table: String,
    /// Table holding split records.
    pub split_table: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            daily_threshold: Duration::from_secs(24 * HOUR),
            intraday_threshold: Duration::from_secs(2 * HOUR),
            daily_history: Duration::from_secs(19 * 365 * DAY),
            intraday_history: Duration::from_secs(365 * DAY),
            daily_table: "daily_raw".to_string(),
            intraday_table: "intraday_raw".to_string(),
            split_table: "split_ref".to_string(),
        }
    }
}

impl SyncConfig {
    /// Freshness threshold for `resolution`.
    #[must_use]
    pub const fn threshold(&self, resolution: Resolution) -> Duration {
        match resolution {
            Resolution::Daily => self.daily_threshold,
            Resolution::Intraday => self.intraday_threshold,
        }
    }

    /// Maximal history window fetched on a full reload for `resolution`.
    #[must_use]
    pub const fn history(&self, resolution: Resolution) -> Duration {
        match resolution {
            Resolution::Daily => self.daily_history,
            Resolution::Intraday => self.intraday_history,
        }
    }

    /// Bar table name for `resolution`.
    #[must_use]
    pub fn table(&self, resolution: Resolution) -> &str {
        match resolution {
            Resolution::Daily => &self.daily_table,
            Resolution::Intraday => &self.intraday_table,
        }
    }

    /// Resolve a bar table name to its resolution.
    ///
    /// # Errors
    /// Returns `UnsupportedResolution` when `table` is neither the daily nor the
    /// intraday table (the split table included).
    pub fn resolution_for_table(&self, table: &str) -> Result<Resolution, SyncError> {
        Resolution::ALL
            .into_iter()
            .find(|r| self.table(*r) == table)
            .ok_or_else(|| SyncError::unsupported_resolution(table))
    }

    /// Check that thresholds and windows are non-zero and table names distinct.
    ///
    /// # Errors
    /// Returns `SyncError::Config` describing the first violation found.
    pub fn validate(&self) -> Result<(), SyncError> {
        for r in Resolution::ALL {
            if self.threshold(r).is_zero() {
                return Err(SyncError::Config(format!("{r} threshold must be non-zero")));
            }
            if self.history(r).is_zero() {
                return Err(SyncError::Config(format!(
                    "{r} history window must be non-zero"
                )));
            }
        }
        let names = [&self.daily_table, &self.intraday_table, &self.split_table];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(SyncError::Config("table names must not be empty".into()));
        }
        if self.daily_table == self.intraday_table
            || self.daily_table == self.split_table
            || self.intraday_table == self.split_table
        {
            return Err(SyncError::Config("table names must be distinct".into()));
        }
        Ok(())
    }
}

/// Spacing rules applied to provider calls by the throttle middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum delay between the start of two consecutive calls.
    pub min_spacing: Duration,
    /// Optional cap on calls started within one `window`.
    pub limit: Option<u64>,
    /// Accounting window for `limit`.
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_millis(1100),
            limit: None,
            window: Duration::from_secs(60),
        }
    }
}
