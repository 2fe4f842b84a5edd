//! Public operations on the downloader handle.
//!
//! Fire-and-forget operations return as soon as the owner task has the
//! command; their effects are observable through events and the query
//! methods, which are answered in command order.

use super::MapFilesDownloader;
use super::file_request::{ChunkCallback, FetchRequest};
use super::owner::Command;
use super::subscribers::{Subscriber, SubscriberId};
use crate::error::Result;
use crate::policy::DownloadingPolicy;
use crate::types::{DownloaderState, FileId, QueuedFile, ServersList};
use std::sync::{Arc, Weak};

impl MapFilesDownloader {
    /// Request a map file download
    ///
    /// If the mirror list is known and downloading is allowed, the file is handed
    /// to the dispatcher right away (after any requests parked earlier). Otherwise
    /// it is quarantined and, when no mirrors are known, a mirror list resolution
    /// is started unless one is already running.
    ///
    /// A request whose id is already quarantined is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`](crate::Error::ShuttingDown) after shutdown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mapfiles_dl::*;
    /// # fn example(downloader: MapFilesDownloader) -> Result<()> {
    /// downloader.submit_download(QueuedFile::new("Belarus", "Belarus.mwm", 240105))?;
    /// downloader.submit_download(
    ///     QueuedFile::new("Estonia", "Estonia.mwm", 240105).with_destination("/data/maps"),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit_download(&self, file: QueuedFile) -> Result<()> {
        tracing::debug!(file_id = %file.id, file_name = %file.file_name, "Map file requested");
        self.send(Command::Submit(file))
    }

    /// Remove a pending request from the quarantine
    ///
    /// No-op if the request is not quarantined (already dispatched, never submitted).
    pub fn remove(&self, id: impl Into<FileId>) -> Result<()> {
        self.send(Command::Remove(id.into()))
    }

    /// Drop every quarantined request
    pub fn clear_quarantine(&self) -> Result<()> {
        self.send(Command::ClearQuarantine)
    }

    /// Requests currently held in the quarantine, in dispatch order
    pub async fn queue(&self) -> Result<Vec<QueuedFile>> {
        self.request(Command::Queue).await
    }

    /// Replace the mirror list
    ///
    /// A non-empty list makes the downloader ready and dispatches quarantined
    /// requests (if downloading is allowed). An empty list puts it back in the
    /// unresolved state; the next submission resolves mirrors again.
    pub fn set_servers_list(&self, servers: ServersList) -> Result<()> {
        self.send(Command::SetServersList(servers))
    }

    /// Current mirror list (empty if not resolved yet)
    pub async fn servers_list(&self) -> Result<ServersList> {
        self.request(Command::ServersList).await
    }

    /// Whether mirrors are known, being resolved, or neither
    pub async fn state(&self) -> Result<DownloaderState> {
        self.request(Command::State).await
    }

    /// Absolute URLs of `relative` on every known mirror, in mirror list order
    ///
    /// Empty while the mirror list is unknown.
    pub async fn make_url_list(&self, relative: impl Into<String>) -> Result<Vec<String>> {
        let relative = relative.into();
        self.request(|reply| Command::MakeUrlList { relative, reply })
            .await
    }

    /// Install a downloading policy, or `None` to always allow
    ///
    /// Tightening the policy never cancels transfers already running. After
    /// loosening it, call [`retry_pending`](Self::retry_pending).
    pub fn set_downloading_policy(&self, policy: Option<Arc<dyn DownloadingPolicy>>) -> Result<()> {
        self.send(Command::SetPolicy(policy))
    }

    /// Answer of the current downloading policy (true when none is installed)
    pub async fn is_downloading_allowed(&self) -> Result<bool> {
        self.request(Command::IsDownloadingAllowed).await
    }

    /// Dispatch quarantined requests now if possible
    ///
    /// With mirrors known this drains the quarantine (subject to the policy);
    /// without, it starts a resolution if anything is waiting.
    pub fn retry_pending(&self) -> Result<()> {
        self.send(Command::RetryPending)
    }

    /// Fetch a small resource relative to the current mirror
    ///
    /// Only one string fetch runs at a time. A first-pass request
    /// (`first_pass = true`) is dropped while another fetch is in flight or
    /// awaiting its continuation. A continuation (`first_pass = false`)
    /// replaces whatever is in flight.
    ///
    /// `on_chunk` receives the non-empty response body on the owner task and
    /// returns `true` to keep the slot reserved for a continuation. Errors and
    /// empty bodies are logged and not forwarded.
    ///
    /// If the mirror list is unknown, a resolution is started and the fetch runs
    /// once it succeeds. If a resolution is already running, the request is
    /// dropped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use mapfiles_dl::*;
    /// # fn example(downloader: MapFilesDownloader) -> Result<()> {
    /// downloader.download_as_string("countries.txt", true, |body| {
    ///     println!("{}", String::from_utf8_lossy(body));
    ///     false
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn download_as_string<F>(&self, url: impl Into<String>, first_pass: bool, on_chunk: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        let on_chunk: ChunkCallback = Box::new(on_chunk);
        self.send(Command::DownloadAsString(FetchRequest {
            url: url.into(),
            first_pass,
            on_chunk,
        }))
    }

    /// Register a synchronous event subscriber
    ///
    /// The downloader only keeps a weak reference: dropping the last `Arc`
    /// unregisters the subscriber. Registering the same object twice returns
    /// the same id.
    pub async fn register_subscriber<S>(&self, subscriber: &Arc<S>) -> Result<SubscriberId>
    where
        S: Subscriber + 'static,
    {
        let subscriber: Weak<dyn Subscriber> = Arc::downgrade(subscriber) as Weak<dyn Subscriber>;
        self.request(|reply| Command::RegisterSubscriber { subscriber, reply })
            .await
    }

    /// Unregister a subscriber; returns false if `id` was not registered
    pub async fn unregister_subscriber(&self, id: SubscriberId) -> Result<bool> {
        self.request(|reply| Command::UnregisterSubscriber { id, reply })
            .await
    }

    /// Unregister every synchronous subscriber
    pub fn unsubscribe_all(&self) -> Result<()> {
        self.send(Command::UnsubscribeAll)
    }
}
