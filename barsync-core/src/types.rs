//! Re-export of foundational types from `barsync-types`.
// Consolidated re-exports so downstream crates can depend on `barsync-core` only

pub use barsync_types::{Bar, Resolution, SplitRecord, SplitSource};
pub use barsync_types::{DataQualityAnomaly, PassFailure, PassReport, RunReport, RunStatus};
pub use barsync_types::{SymbolOutcome, SymbolReport};
pub use barsync_types::{SyncConfig, SyncError, ThrottleConfig};
