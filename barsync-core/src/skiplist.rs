use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::SyncError;

/// Durable, append-only storage behind a [`SkipList`].
#[async_trait]
pub trait SkipListSink: Send + Sync {
    /// Every symbol persisted so far.
    async fn load(&self) -> Result<Vec<String>, SyncError>;

    /// Persist one more symbol. Called at most once per symbol per process.
    async fn append(&self, symbol: &str) -> Result<(), SyncError>;
}

/// Symbols known to have no intraday coverage at the provider.
///
/// Membership is monotonic: there is no removal API. Entries are written to
/// the durable sink before they become visible in memory, so a failed append
/// leaves the set unchanged.
pub struct SkipList {
    members: RwLock<HashSet<String>>,
    sink: Arc<dyn SkipListSink>,
    insert_lock: tokio::sync::Mutex<()>,
}

impl SkipList {
    /// Empty skip-list that persists new entries to `sink`.
    pub fn new(sink: Arc<dyn SkipListSink>) -> Self {
        Self {
            members: RwLock::new(HashSet::new()),
            sink,
            insert_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Skip-list hydrated from everything `sink` has persisted.
    ///
    /// # Errors
    /// Returns the sink's error when loading fails.
    pub async fn load(sink: Arc<dyn SkipListSink>) -> Result<Self, SyncError> {
        let stored = sink.load().await?;
        let list = Self::new(sink);
        {
            let mut members = list.members.write().unwrap_or_else(PoisonError::into_inner);
            members.extend(stored);
        }
        Ok(list)
    }

    /// Whether `symbol` is on the list.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(symbol)
    }

    /// Add `symbol`, persisting it first. Returns `false` if it was already present.
    ///
    /// # Errors
    /// Returns the sink's error; the in-memory set is left untouched.
    pub async fn insert(&self, symbol: &str) -> Result<bool, SyncError> {
        let _guard = self.insert_lock.lock().await;
        if self.contains(symbol) {
            return Ok(false);
        }
        self.sink.append(symbol).await?;
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.to_string());
        Ok(true)
    }

    /// Number of listed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no symbol is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the listed symbols.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        out.sort();
        out
    }
}

impl core::fmt::Debug for SkipList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SkipList")
            .field("members", &self.members())
            .finish_non_exhaustive()
    }
}

/// Plain-text sink: one symbol per line, created on first append.
///
/// Blank lines and lines starting with `#` are ignored when loading, so the
/// file can be edited by hand to clear entries.
#[derive(Debug)]
pub struct FileSkipListSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSkipListSink {
    /// Sink backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, op: &str, e: &std::io::Error) -> SyncError {
        SyncError::SkipList(format!("{op} {}: {e}", self.path.display()))
    }
}

#[async_trait]
impl SkipListSink for FileSkipListSink {
    async fn load(&self) -> Result<Vec<String>, SyncError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("read", &e)),
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    async fn append(&self, symbol: &str) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error("open", &e))?;
        file.write_all(format!("{symbol}\n").as_bytes())
            .await
            .map_err(|e| self.io_error("write", &e))?;
        file.flush().await.map_err(|e| self.io_error("flush", &e))
    }
}
