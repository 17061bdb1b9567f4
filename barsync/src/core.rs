use std::sync::Arc;

use barsync_core::{
    AlertSink, Clock, DataSource, LogAlertSink, SkipList, SourceMiddleware, StorageBackend,
    SyncConfig, SyncEngine, SyncError, SystemClock,
};

/// Runs the sync engine across a symbol universe, one pass per resolution.
///
/// Cheap to clone: every collaborator is shared behind an `Arc`.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) engine: Arc<SyncEngine>,
    pub(crate) alerts: Arc<dyn AlertSink>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start building a new `Orchestrator`.
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use barsync::Orchestrator;
    ///
    /// let orchestrator = Orchestrator::builder()
    ///     .source(finnhub)
    ///     .storage(sqlite)
    ///     .skip_list(skip_list)
    ///     .build()?;
    /// let report = orchestrator.run_both(universe).await;
    /// ```
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// The engine used for each symbol.
    #[must_use]
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        self.engine.config()
    }
}

/// Builder for constructing an `Orchestrator` with custom collaborators.
pub struct OrchestratorBuilder {
    source: Option<Arc<dyn DataSource>>,
    storage: Option<Arc<dyn StorageBackend>>,
    skip_list: Option<Arc<SkipList>>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    middleware: Vec<Box<dyn SourceMiddleware>>,
    cfg: SyncConfig,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    /// Create a new builder with default configuration, a logging alert sink
    /// and the system clock.
    ///
    /// The default [`LogAlertSink`] only delivers when the `tracing` feature is
    /// enabled; without it, set a sink with [`alerts`](Self::alerts).
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            storage: None,
            skip_list: None,
            alerts: Arc::new(LogAlertSink),
            clock: Arc::new(SystemClock),
            middleware: Vec::new(),
            cfg: SyncConfig::default(),
        }
    }

    /// Set the market-data provider.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the bar and split storage backend.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the intraday skip-list, typically hydrated with [`SkipList::load`].
    #[must_use]
    pub fn skip_list(mut self, skip_list: Arc<SkipList>) -> Self {
        self.skip_list = Some(skip_list);
        self
    }

    /// Set the sink that receives one message per failed pass.
    #[must_use]
    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Override the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wrap the source in `middleware`. Layers are applied in registration
    /// order, so the last one registered is outermost.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Box<dyn SourceMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: SyncConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Build the `Orchestrator`.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the source, storage or skip-list is missing,
    /// and `Config` when the configuration fails validation.
    pub fn build(self) -> Result<Orchestrator, SyncError> {
        let source = self.source.ok_or_else(|| {
            SyncError::InvalidArg("no data source configured; call source(...)".to_string())
        })?;
        let storage = self.storage.ok_or_else(|| {
            SyncError::InvalidArg("no storage backend configured; call storage(...)".to_string())
        })?;
        let skip_list = self.skip_list.ok_or_else(|| {
            SyncError::InvalidArg("no skip-list configured; call skip_list(...)".to_string())
        })?;
        self.cfg.validate()?;

        let source = self
            .middleware
            .into_iter()
            .fold(source, |inner, layer| layer.apply(inner));

        Ok(Orchestrator {
            engine: Arc::new(SyncEngine::new(source, storage, skip_list, self.cfg)),
            alerts: self.alerts,
            clock: self.clock,
        })
    }
}
