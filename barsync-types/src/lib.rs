//! Shared barsync data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod bar;
mod config;
mod error;
mod reports;
mod resolution;

pub use bar::{Bar, SplitRecord, SplitSource};
pub use config::{SyncConfig, ThrottleConfig};
pub use error::SyncError;
pub use reports::{
    DataQualityAnomaly, PassFailure, PassReport, RunReport, RunStatus, SymbolOutcome,
    SymbolReport,
};
pub use resolution::Resolution;
