//! Deterministic in-memory collaborators for barsync tests and demos.
//!
//! - [`MockSource`] is scripted through a [`MockController`] and records every call.
//! - [`MemoryStorage`] is a `StorageBackend` with failure injection.
//! - [`RecordingAlertSink`], [`MemorySkipListSink`] and [`FixedClock`] round out
//!   the seams an orchestrator needs.

mod clock;
mod dynamic;
pub mod fixtures;
mod sinks;
mod storage;

pub use clock::FixedClock;
pub use dynamic::{MockBehavior, MockController, MockSource, SourceCall};
pub use sinks::{MemorySkipListSink, RecordingAlertSink};
pub use storage::MemoryStorage;
