use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolution::Resolution;

/// Unified error type for the barsync workspace.
///
/// Provider and storage failures abort the enclosing pass; volume mismatches
/// without a corroborating split are not errors (see
/// [`crate::DataQualityAnomaly`]).
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    /// The market-data provider was unreachable or answered with a malformed payload.
    #[error("{provider} failed: {msg}")]
    Provider {
        /// Provider name that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A storage write was rejected. Nothing from the failed call is visible.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// A delete removed a different number of rows than were counted beforehand.
    #[error("deleted {deleted} of {expected} rows for {symbol} in {table}")]
    RowCountMismatch {
        /// Symbol being deleted.
        symbol: String,
        /// Table the rows were deleted from.
        table: String,
        /// Rows counted before the delete.
        expected: u64,
        /// Rows reported deleted.
        deleted: u64,
    },

    /// A storage read failed.
    #[error("storage query failed: {0}")]
    StorageQuery(String),

    /// The engine was invoked for a table it does not synchronize.
    #[error("unsupported resolution for table {table}")]
    UnsupportedResolution {
        /// Offending table name.
        table: String,
    },

    /// The durable skip-list sink failed.
    #[error("skip-list sink failed: {0}")]
    SkipList(String),

    /// The pass was cancelled between two symbols.
    #[error("{resolution} pass cancelled")]
    Cancelled {
        /// Resolution of the cancelled pass.
        resolution: Resolution,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl SyncError {
    /// Helper: build a `Provider` error with the provider name and message.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `StorageWrite` error.
    pub fn storage_write(msg: impl Into<String>) -> Self {
        Self::StorageWrite(msg.into())
    }

    /// Helper: build a `StorageQuery` error.
    pub fn storage_query(msg: impl Into<String>) -> Self {
        Self::StorageQuery(msg.into())
    }

    /// Helper: build an `UnsupportedResolution` error for a table name.
    pub fn unsupported_resolution(table: impl Into<String>) -> Self {
        Self::UnsupportedResolution {
            table: table.into(),
        }
    }

    /// Stable category label carried in operator alerts.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::StorageWrite(_) | Self::RowCountMismatch { .. } => "storage-write",
            Self::StorageQuery(_) => "storage-query",
            Self::UnsupportedResolution { .. } => "unsupported-resolution",
            Self::SkipList(_) => "skip-list",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidArg(_) => "invalid-argument",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }

    /// True for storage write rejections, row-count mismatches included.
    #[must_use]
    pub const fn is_storage_write(&self) -> bool {
        matches!(self, Self::StorageWrite(_) | Self::RowCountMismatch { .. })
    }

    /// True for precondition violations that must fail before any symbol is touched.
    #[must_use]
    pub const fn is_fatal_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedResolution { .. } | Self::InvalidArg(_) | Self::Config(_)
        )
    }
}
