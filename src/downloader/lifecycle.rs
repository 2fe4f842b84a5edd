//! Shutdown coordination.

use crate::error::Result;

use super::MapFilesDownloader;

impl MapFilesDownloader {
    /// Stop the owner task
    ///
    /// Quarantined requests are dropped, the in-flight string fetch, mirror
    /// resolution and file downloads are aborted, and every handle clone starts
    /// returning [`Error::ShuttingDown`](crate::Error::ShuttingDown).
    ///
    /// Calling `shutdown` more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`](crate::Error::Other) if the owner task panicked.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating shutdown");
        self.shutdown.cancel();

        let owner_task = self.owner_task.lock().await.take();
        if let Some(task) = owner_task {
            task.await.map_err(|e| {
                tracing::error!(error = %e, "Owner task ended abnormally");
                crate::error::Error::Other(format!("owner task failed: {e}"))
            })?;
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// True once [`shutdown`](Self::shutdown) has been requested
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled() || self.commands.is_closed()
    }
}
