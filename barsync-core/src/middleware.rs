//! Middleware trait for wrapping `DataSource` implementations.

use std::sync::Arc;

use crate::connector::DataSource;

/// Trait implemented by data-source middleware layers.
///
/// A middleware consumes an inner `DataSource` and returns a wrapped source
/// that augments its behavior (e.g., call spacing).
pub trait SourceMiddleware: Send + Sync {
    /// Apply this middleware to wrap an inner source and return the wrapped source.
    fn apply(self: Box<Self>, inner: Arc<dyn DataSource>) -> Arc<dyn DataSource>;

    /// Human-readable middleware name for introspection/logging.
    fn name(&self) -> &'static str;

    /// Opaque configuration snapshot for serialization/inspection.
    fn config_json(&self) -> serde_json::Value;
}
