//! Builder for composing a data source with middleware layers.
//!
//! Layers form an onion around the raw source:
//!
//! ```text
//! SyncEngine
//!     ↓
//! Outermost middleware
//!     ↓
//! Inner middleware (e.g., ThrottledSource)
//!     ↓
//! Raw source (e.g., Finnhub)
//! ```
//!
//! `layers` is kept outermost-first and applied in reverse during `build()`.

use std::sync::Arc;

use barsync_core::{DataSource, SourceMiddleware, ThrottleConfig};
use serde_json::json;

use crate::throttle::ThrottleMiddleware;

const THROTTLE: &str = "ThrottledSource";

/// Middleware builder for wrapping a raw data source.
pub struct SourceBuilder {
    raw: Arc<dyn DataSource>,
    /// Middleware layers in outermost-first order.
    layers: Vec<Box<dyn SourceMiddleware>>,
}

impl SourceBuilder {
    /// Create a new builder from a raw, unwrapped source.
    #[must_use]
    pub fn new(raw: Arc<dyn DataSource>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    /// Add or replace the throttle layer.
    ///
    /// The throttle sits innermost so every call that reaches the provider
    /// is spaced, whatever other layers do.
    #[must_use]
    pub fn with_throttle(mut self, cfg: ThrottleConfig) -> Self {
        self.layers.retain(|m| m.name() != THROTTLE);
        self.layers.push(Box::new(ThrottleMiddleware::new(cfg)));
        self
    }

    /// Remove the throttle if present.
    #[must_use]
    pub fn without_throttle(mut self) -> Self {
        self.layers.retain(|m| m.name() != THROTTLE);
        self
    }

    /// Add an arbitrary middleware layer at the outermost position.
    #[must_use]
    pub fn layer(mut self, layer: Box<dyn SourceMiddleware>) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Describe the stack, outermost first, ending with the raw source.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        let mut layers: Vec<serde_json::Value> = self
            .layers
            .iter()
            .map(|l| json!({ "name": l.name(), "config": l.config_json() }))
            .collect();
        layers.push(json!({ "name": "RawSource", "config": { "name": self.raw.name() } }));
        serde_json::Value::Array(layers)
    }

    /// Build the wrapped source; the first layer ends up outermost.
    #[must_use]
    pub fn build(self) -> Arc<dyn DataSource> {
        let mut acc: Arc<dyn DataSource> = Arc::clone(&self.raw);
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
