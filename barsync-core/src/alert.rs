use async_trait::async_trait;

use crate::SyncError;
use crate::connector::AlertSink;

/// Alert sink that writes the message as an `error` tracing event on the
/// `barsync::alert` target.
///
/// Useful where no paging channel is configured; delivery never fails.
/// Messages only go anywhere when the crate is built with the `tracing`
/// feature and a subscriber is installed. Without the feature they are
/// dropped, so pass an explicit [`AlertSink`] in that case.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, message: &str) -> Result<(), SyncError> {
        #[cfg(feature = "tracing")]
        tracing::error!(target: "barsync::alert", "{message}");
        #[cfg(not(feature = "tracing"))]
        let _ = message;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivery_never_fails() {
        let sink = LogAlertSink;
        assert!(sink.notify("[barsync] daily_raw pass failed").await.is_ok());
        assert!(sink.notify("").await.is_ok());
    }
}
