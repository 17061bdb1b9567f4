use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use barsync_core::{Clock, PassFailure, PassReport, Resolution, RunReport, SyncError};

use crate::Orchestrator;

/// Handle to one spawned resolution pass.
///
/// Cancellation is cooperative: the pass stops before its next symbol and
/// never interrupts a symbol mid-evaluation. Dropping the handle requests
/// cancellation.
pub struct PassHandle {
    resolution: Resolution,
    table: String,
    started_at: DateTime<Utc>,
    orchestrator: Orchestrator,
    cancel: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<PassReport, PassFailure>>>,
}

impl PassHandle {
    fn spawn(orchestrator: &Orchestrator, resolution: Resolution, universe: Arc<[String]>) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let runner = orchestrator.clone();
        let task = tokio::spawn(async move {
            runner
                .run_pass_until(resolution, &universe[..], &flag)
                .await
        });
        Self {
            resolution,
            table: orchestrator.config().table(resolution).to_string(),
            started_at: orchestrator.clock.now(),
            orchestrator: orchestrator.clone(),
            cancel,
            task: Some(task),
        }
    }

    /// Resolution this pass synchronizes.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Ask the pass to stop before its next symbol.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Return `true` if the pass has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the pass to finish.
    ///
    /// # Errors
    /// Returns the pass's own `PassFailure`, or one carrying `SyncError::Other`
    /// if the task panicked. A panicked pass is alerted here, once, like any
    /// other failed pass.
    pub async fn join(mut self) -> Result<PassReport, PassFailure> {
        let Some(task) = self.task.take() else {
            return Err(self.lost("pass already joined"));
        };
        match task.await {
            Ok(result) => result,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(resolution = %self.resolution, error = %e, "pass task did not complete");
                let failure = self.lost(&format!("pass task did not complete: {e}"));
                if e.is_cancelled() {
                    return Err(failure);
                }
                Err(self.orchestrator.escalate(failure).await)
            }
        }
    }

    fn lost(&self, msg: &str) -> PassFailure {
        PassFailure {
            resolution: Some(self.resolution),
            table: self.table.clone(),
            started_at: self.started_at,
            failed_at: self.orchestrator.clock.now(),
            symbol: None,
            completed: 0,
            error: SyncError::Other(msg.to_string()),
        }
    }
}

impl Drop for PassHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel();
        }
    }
}

/// The daily and intraday passes running side by side.
pub struct RunHandle {
    daily: PassHandle,
    intraday: PassHandle,
}

impl RunHandle {
    /// Handle of the daily pass.
    #[must_use]
    pub const fn daily(&self) -> &PassHandle {
        &self.daily
    }

    /// Handle of the intraday pass.
    #[must_use]
    pub const fn intraday(&self) -> &PassHandle {
        &self.intraday
    }

    /// Cancel both passes.
    pub fn cancel(&self) {
        self.daily.cancel();
        self.intraday.cancel();
    }

    /// Wait for both passes; one failing never stops the other.
    pub async fn join(self) -> RunReport {
        let (daily, intraday) = futures::future::join(self.daily.join(), self.intraday.join()).await;
        RunReport { daily, intraday }
    }
}

impl Orchestrator {
    /// Spawn the daily and intraday passes over `universe` as two tasks.
    ///
    /// The passes share no per-symbol state; the intraday pass alone mutates
    /// the skip-list. Must be called from within a Tokio runtime.
    pub fn spawn_run<I, S>(&self, universe: I) -> RunHandle
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let universe: Arc<[String]> = universe.into_iter().map(Into::into).collect();
        RunHandle {
            daily: PassHandle::spawn(self, Resolution::Daily, Arc::clone(&universe)),
            intraday: PassHandle::spawn(self, Resolution::Intraday, universe),
        }
    }

    /// Run both passes concurrently and wait for them.
    pub async fn run_both<I, S>(&self, universe: I) -> RunReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spawn_run(universe).join().await
    }
}
