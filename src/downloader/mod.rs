//! Core downloader implementation split into focused submodules.
//!
//! [`MapFilesDownloader`] is a cheap, cloneable handle. All state lives in a
//! single owner task; handle methods send it commands and, for queries, await
//! the reply. The pieces are organized by concern:
//! - [`owner`] - The owner task: command loop and dispatch state machine
//! - [`quarantine`] - Ordered holding area for requests waiting on mirrors or policy
//! - [`resolver`] - Mirror list resolution with an in-flight latch
//! - [`file_request`] - Single in-flight string fetch with continuations
//! - [`subscribers`] - Weakly-held event subscribers
//! - [`builder`] - Construction with custom collaborators
//! - [`control`] - Public operations on the handle
//! - [`lifecycle`] - Shutdown coordination

mod builder;
mod control;
mod file_request;
mod lifecycle;
mod owner;
mod quarantine;
mod resolver;
mod subscribers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use builder::MapFilesDownloaderBuilder;
pub use file_request::ChunkCallback;
pub use subscribers::{Subscriber, SubscriberId};

use crate::config::Config;
use crate::error::{Error, Result};
use owner::Command;

/// Handle to the map files download orchestrator (cloneable - all clones share one owner task)
///
/// Map file requests submitted before the mirror list is known are held in a
/// quarantine, a single mirror list resolution is started, and the held requests
/// are dispatched in submission order once mirrors arrive. If resolution fails,
/// requests stay held until the next submission (or [`retry_pending`](Self::retry_pending))
/// triggers another attempt.
#[derive(Clone)]
pub struct MapFilesDownloader {
    /// Command channel to the owner task
    pub(crate) commands: tokio::sync::mpsc::UnboundedSender<Command>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<crate::types::Event>,
    /// Configuration (wrapped in Arc for sharing across clones)
    pub(crate) config: std::sync::Arc<Config>,
    /// Stops the owner task
    pub(crate) shutdown: tokio_util::sync::CancellationToken,
    /// Owner task handle, taken by the first `shutdown` call
    pub(crate) owner_task:
        std::sync::Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl MapFilesDownloader {
    /// Create a downloader with the default HTTP collaborators
    ///
    /// Mirrors are fetched from `config.meta_server_url` and map files are written
    /// below `config.download_dir`. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is unusable and
    /// [`Error::Network`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mapfiles_dl::{Config, MapFilesDownloader, QueuedFile};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MapFilesDownloader::new(Config {
    ///         meta_server_url: Some("https://meta.example.com/servers".into()),
    ///         ..Config::default()
    ///     })?;
    ///
    ///     downloader.submit_download(QueuedFile::new("Belarus", "Belarus.mwm", 240105))?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        MapFilesDownloaderBuilder::new(config).build()
    }

    /// Start building a downloader with custom collaborators
    pub fn builder(config: Config) -> MapFilesDownloaderBuilder {
        MapFilesDownloaderBuilder::new(config)
    }

    /// Subscribe to orchestrator events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. If a subscriber falls behind by more than
    /// `config.event_buffer` events, it receives a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mapfiles_dl::{Config, MapFilesDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MapFilesDownloader::new(Config {
    ///         meta_server_url: Some("https://meta.example.com/servers".into()),
    ///         ..Config::default()
    ///     })?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "map download event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::types::Event> {
        self.event_tx.subscribe()
    }

    /// Get the configuration the downloader was built with
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// Send a fire-and-forget command to the owner task
    pub(crate) fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ShuttingDown)
    }

    /// Send a command carrying a reply channel and wait for the answer
    pub(crate) async fn request<T>(
        &self,
        command: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.send(command(reply_tx))?;
        reply_rx.await.map_err(|_| Error::ShuttingDown)
    }
}
