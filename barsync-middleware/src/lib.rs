//! barsync-middleware
//!
//! Wrappers layered around a raw [`DataSource`](barsync_core::DataSource).
#![warn(missing_docs)]

mod builder;
mod throttle;

pub use crate::builder::SourceBuilder;
pub use crate::throttle::{ThrottleMiddleware, ThrottledSource};
