use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use barsync_core::connector::AlertSink;
use barsync_core::skiplist::SkipListSink;
use barsync_core::SyncError;

/// Alert sink that records every message, optionally failing delivery.
#[derive(Default)]
pub struct RecordingAlertSink {
    messages: Mutex<Vec<String>>,
    fail: Mutex<Option<SyncError>>,
}

impl RecordingAlertSink {
    /// Sink that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that records messages but reports `err` from every `notify`.
    #[must_use]
    pub fn failing(err: SyncError) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: Mutex::new(Some(err)),
        }
    }

    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, message: &str) -> Result<(), SyncError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        self.fail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map_or(Ok(()), Err)
    }
}

/// Skip-list sink holding its entries in memory.
#[derive(Default)]
pub struct MemorySkipListSink {
    entries: Mutex<Vec<String>>,
    fail_appends: Mutex<bool>,
}

impl MemorySkipListSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink pre-populated with `symbols`.
    #[must_use]
    pub fn with_entries<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Mutex::new(symbols.into_iter().map(Into::into).collect()),
            fail_appends: Mutex::new(false),
        }
    }

    /// Make subsequent appends fail.
    pub fn fail_appends(&self, on: bool) {
        *self
            .fail_appends
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = on;
    }

    /// Entries in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SkipListSink for MemorySkipListSink {
    async fn load(&self) -> Result<Vec<String>, SyncError> {
        Ok(self.entries())
    }

    async fn append(&self, symbol: &str) -> Result<(), SyncError> {
        if *self
            .fail_appends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(SyncError::SkipList(format!("append {symbol} rejected")));
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(symbol.to_string());
        Ok(())
    }
}
