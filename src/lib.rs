//! # mapfiles-dl
//!
//! Asynchronous orchestrator for downloading map data files from a mirror
//! network whose mirror list is only known at runtime.
//!
//! ## Design Philosophy
//!
//! mapfiles-dl is designed to be:
//! - **Never lossy** - A request made before mirrors are known is held, not dropped
//! - **Single-flight** - One mirror list request and one string fetch at a time
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Pluggable** - Transport, mirror source, file dispatcher and policy are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use mapfiles_dl::{Config, MapFilesDownloader, QueuedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         meta_server_url: Some("https://meta.example.com/servers".to_string()),
//!         download_dir: "/data/maps".into(),
//!         ..Default::default()
//!     };
//!
//!     let downloader = MapFilesDownloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Held until the mirror list arrives, then downloaded from the last mirror
//!     downloader.submit_download(QueuedFile::new("Belarus", "Belarus.mwm", 240105))?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Map file download collaborators
pub mod dispatch;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Downloading policy gate
pub mod policy;
/// Retry logic with exponential backoff
pub mod retry;
/// Mirror list sources
pub mod servers_list;
/// HTTP transport abstraction
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use dispatch::{FileDispatcher, HttpFileDispatcher};
pub use downloader::{
    ChunkCallback, MapFilesDownloader, MapFilesDownloaderBuilder, Subscriber, SubscriberId,
};
pub use error::{Error, Result};
pub use policy::{DownloadingPolicy, TogglePolicy};
pub use servers_list::{MetaServersListSource, ServersListSource, parse_servers_list};
pub use transport::{HttpTransport, Transport};
pub use types::{DownloadTask, DownloaderState, Event, FileId, QueuedFile, ServersList};
pub use utils::{file_download_url, join_url, make_full_url, make_url_list};

/// Run until a termination signal arrives, then shut the downloader down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if they
///   cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mapfiles_dl::{Config, MapFilesDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MapFilesDownloader::new(Config {
///         meta_server_url: Some("https://meta.example.com/servers".into()),
///         ..Config::default()
///     })?;
///
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MapFilesDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
