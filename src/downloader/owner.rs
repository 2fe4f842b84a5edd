//! The owner task: single writer of all orchestrator state.
//!
//! Every public operation on [`MapFilesDownloader`](super::MapFilesDownloader)
//! becomes a [`Command`] processed here one at a time, and every background
//! result (mirror resolution, string fetch, file download) comes back as a
//! [`Completion`]. Nothing else touches the mirror list, the quarantine or the
//! request slot, so a quarantine replay can never interleave with a new
//! submission.

use super::file_request::{FetchOutcome, FetchRequest, SingleFlightFileRequest};
use super::quarantine::Quarantine;
use super::resolver::MirrorListResolver;
use super::subscribers::{Subscriber, SubscriberId, SubscriberRegistry};
use crate::dispatch::FileDispatcher;
use crate::error::Result;
use crate::policy::DownloadingPolicy;
use crate::transport::Transport;
use crate::types::{DownloadTask, DownloaderState, Event, FileId, QueuedFile, ServersList};
use crate::utils::{join_url, make_url_list};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Requests from the handle to the owner task
pub(crate) enum Command {
    Submit(QueuedFile),
    Remove(FileId),
    ClearQuarantine,
    Queue(oneshot::Sender<Vec<QueuedFile>>),
    SetServersList(ServersList),
    ServersList(oneshot::Sender<ServersList>),
    State(oneshot::Sender<DownloaderState>),
    MakeUrlList {
        relative: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    SetPolicy(Option<Arc<dyn DownloadingPolicy>>),
    IsDownloadingAllowed(oneshot::Sender<bool>),
    RetryPending,
    DownloadAsString(FetchRequest),
    RegisterSubscriber {
        subscriber: Weak<dyn Subscriber>,
        reply: oneshot::Sender<SubscriberId>,
    },
    UnregisterSubscriber {
        id: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    UnsubscribeAll,
}

/// Results of background work, reported back to the owner task
pub(crate) enum Completion {
    ServersList(Result<ServersList>),
    Fetch { request_id: u64, result: Result<Vec<u8>> },
    Download { id: FileId, result: Result<PathBuf> },
}

/// Collaborators and settings the owner task is built from
pub(crate) struct OwnerParts {
    pub(crate) servers: ServersList,
    pub(crate) resolver: MirrorListResolver,
    pub(crate) dispatcher: Arc<dyn FileDispatcher>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: Option<Arc<dyn DownloadingPolicy>>,
    pub(crate) fetch_timeout: Duration,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

pub(crate) struct Owner {
    servers: ServersList,
    quarantine: Quarantine,
    resolver: MirrorListResolver,
    file_request: SingleFlightFileRequest,
    /// String fetch waiting for the resolution it triggered
    deferred_fetch: Option<FetchRequest>,
    policy: Option<Arc<dyn DownloadingPolicy>>,
    subscribers: SubscriberRegistry,
    event_tx: broadcast::Sender<Event>,
    dispatcher: Arc<dyn FileDispatcher>,
    transport: Arc<dyn Transport>,
    fetch_timeout: Duration,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// Resolution, fetch and download tasks; aborted when the owner stops
    tasks: JoinSet<()>,
}

impl Owner {
    pub(crate) fn new(parts: OwnerParts) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            servers: parts.servers,
            quarantine: Quarantine::default(),
            resolver: parts.resolver,
            file_request: SingleFlightFileRequest::default(),
            deferred_fetch: None,
            policy: parts.policy,
            subscribers: SubscriberRegistry::default(),
            event_tx: parts.event_tx,
            dispatcher: parts.dispatcher,
            transport: parts.transport,
            fetch_timeout: parts.fetch_timeout,
            completions_tx,
            completions_rx,
            tasks: JoinSet::new(),
        }
    }

    /// Process commands and completions until shutdown or until every handle is dropped
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!(servers = self.servers.len(), "Owner task started");

        loop {
            // Commands sent before a completion arrived are handled before it
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::debug!("Owner task received shutdown signal");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("All downloader handles dropped");
                        break;
                    }
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Background task panicked");
                        }
                    }
                }
            }
        }

        let pending = self.quarantine.len();
        if pending > 0 {
            tracing::info!(pending, "Dropping quarantined requests on shutdown");
        }
        if self.file_request.is_busy() {
            tracing::debug!(url = ?self.file_request.current_url(), "Aborting string fetch");
            self.file_request.cancel();
        }
        self.tasks.shutdown().await;
        tracing::debug!(subscribers = self.subscribers.len(), "Owner task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit(file) => self.submit(file),
            Command::Remove(id) => self.remove(&id),
            Command::ClearQuarantine => self.clear_quarantine(),
            Command::Queue(reply) => {
                let _ = reply.send(self.quarantine.snapshot());
            }
            Command::SetServersList(servers) => self.set_servers_list(servers),
            Command::ServersList(reply) => {
                let _ = reply.send(self.servers.clone());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state());
            }
            Command::MakeUrlList { relative, reply } => {
                let _ = reply.send(make_url_list(&self.servers, &relative));
            }
            Command::SetPolicy(policy) => {
                tracing::debug!(custom = policy.is_some(), "Downloading policy replaced");
                self.policy = policy;
            }
            Command::IsDownloadingAllowed(reply) => {
                let _ = reply.send(self.downloading_allowed());
            }
            Command::RetryPending => self.retry_pending(),
            Command::DownloadAsString(request) => self.download_as_string(request),
            Command::RegisterSubscriber { subscriber, reply } => {
                let _ = reply.send(self.subscribers.register(subscriber));
            }
            Command::UnregisterSubscriber { id, reply } => {
                let _ = reply.send(self.subscribers.unregister(id));
            }
            Command::UnsubscribeAll => {
                let count = self.subscribers.clear();
                tracing::debug!(count, "Unregistered all subscribers");
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::ServersList(result) => self.on_servers_list(result),
            Completion::Fetch { request_id, result } => {
                match self.file_request.complete(request_id, result) {
                    FetchOutcome::Kept => {
                        tracing::debug!("String fetch slot kept for continuation");
                    }
                    FetchOutcome::Released => {}
                    FetchOutcome::Stale => {
                        tracing::debug!(request_id, "Ignoring superseded string fetch");
                    }
                }
            }
            Completion::Download { id, result } => match result {
                Ok(path) => {
                    tracing::info!(file_id = %id, path = %path.display(), "Map file downloaded");
                    self.emit(Event::DownloadComplete { id, path });
                }
                Err(e) => {
                    tracing::error!(file_id = %id, error = %e, "Map file download failed");
                    self.emit(Event::DownloadFailed {
                        id,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    fn state(&self) -> DownloaderState {
        if !self.servers.is_empty() {
            DownloaderState::Ready
        } else if self.resolver.in_flight() {
            DownloaderState::Resolving
        } else {
            DownloaderState::Unresolved
        }
    }

    fn downloading_allowed(&self) -> bool {
        self.policy
            .as_ref()
            .is_none_or(|policy| policy.is_downloading_allowed())
    }

    fn emit(&mut self, event: Event) {
        self.subscribers.notify(&event);
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    fn submit(&mut self, file: QueuedFile) {
        if self.servers.is_empty() {
            self.quarantine_file(file);
            self.resolve_servers();
            return;
        }

        if !self.downloading_allowed() {
            tracing::debug!(file_id = %file.id, "Downloading not allowed, holding request");
            self.quarantine_file(file);
            return;
        }

        // Anything parked earlier goes first
        self.drain_quarantine();
        self.dispatch(file);
    }

    fn quarantine_file(&mut self, file: QueuedFile) {
        let id = file.id.clone();
        if self.quarantine.append(file) {
            tracing::debug!(file_id = %id, pending = self.quarantine.len(), "Request quarantined");
            self.emit(Event::Quarantined { id });
        } else {
            tracing::debug!(file_id = %id, "Request already quarantined, ignoring duplicate");
        }
    }

    fn remove(&mut self, id: &FileId) {
        if self.quarantine.is_empty() {
            return;
        }
        if let Some(file) = self.quarantine.remove(id) {
            tracing::debug!(file_id = %file.id, "Quarantined request removed");
            self.emit(Event::Removed { id: file.id });
        }
    }

    fn clear_quarantine(&mut self) {
        let count = self.quarantine.clear();
        if count > 0 {
            tracing::info!(count, "Quarantine cleared");
            self.emit(Event::QuarantineCleared { count });
        }
    }

    fn set_servers_list(&mut self, servers: ServersList) {
        tracing::info!(servers = servers.len(), "Servers list set by caller");
        self.servers = servers;
        if !self.servers.is_empty() {
            self.drain_quarantine();
        }
    }

    fn retry_pending(&mut self) {
        if !self.servers.is_empty() {
            self.drain_quarantine();
        } else if !self.quarantine.is_empty() {
            self.resolve_servers();
        }
    }

    fn resolve_servers(&mut self) {
        if self.resolver.resolve(&mut self.tasks, &self.completions_tx) {
            tracing::info!("Resolving servers list");
        } else {
            tracing::debug!("Servers list resolution already in flight");
        }
    }

    fn on_servers_list(&mut self, result: Result<ServersList>) {
        match self.resolver.finish(result) {
            Ok(servers) => {
                tracing::info!(servers = servers.len(), "Servers list resolved");
                let count = servers.len();
                self.servers = servers;
                self.emit(Event::ServersListResolved { servers: count });
                self.drain_quarantine();
                if let Some(request) = self.deferred_fetch.take() {
                    self.start_fetch(request);
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    pending = self.quarantine.len(),
                    "Servers list resolution failed, keeping requests quarantined"
                );
                if let Some(request) = self.deferred_fetch.take() {
                    tracing::debug!(url = %request.url, "Dropping string fetch waiting for mirrors");
                }
                self.emit(Event::ServersListFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Dispatch every quarantined request in insertion order
    ///
    /// Caller guarantees the mirror list is non-empty.
    fn drain_quarantine(&mut self) {
        if self.quarantine.is_empty() {
            return;
        }
        if !self.downloading_allowed() {
            tracing::debug!(
                pending = self.quarantine.len(),
                "Downloading not allowed, keeping requests quarantined"
            );
            return;
        }

        let pending = self.quarantine.drain();
        tracing::info!(count = pending.len(), "Replaying quarantined requests");
        for file in pending {
            self.dispatch(file);
        }
    }

    fn dispatch(&mut self, file: QueuedFile) {
        let mirror_urls = make_url_list(&self.servers, &file.relative_url());
        let Some(url) = mirror_urls.last().cloned() else {
            // Mirrors were cleared underneath us
            self.quarantine_file(file);
            return;
        };

        tracing::debug!(file_id = %file.id, url = %url, mirrors = mirror_urls.len(), "Dispatching map file");
        self.emit(Event::Dispatched {
            id: file.id.clone(),
            url: url.clone(),
        });

        let dispatcher = self.dispatcher.clone();
        let completions = self.completions_tx.clone();
        self.tasks.spawn(async move {
            let id = file.id.clone();
            let result = dispatcher
                .download(DownloadTask {
                    file,
                    url,
                    mirror_urls,
                })
                .await;
            let _ = completions.send(Completion::Download { id, result });
        });
    }

    fn download_as_string(&mut self, request: FetchRequest) {
        if !self.servers.is_empty() {
            self.start_fetch(request);
            return;
        }

        if self.resolver.in_flight() {
            tracing::debug!(
                url = %request.url,
                "Servers list resolution in flight, dropping string fetch"
            );
            return;
        }

        self.deferred_fetch = Some(request);
        self.resolve_servers();
    }

    fn start_fetch(&mut self, request: FetchRequest) {
        let FetchRequest {
            url,
            first_pass,
            on_chunk,
        } = request;

        if !self.file_request.accepts(first_pass) {
            tracing::debug!(
                url = %url,
                in_flight = ?self.file_request.current_url(),
                "String fetch already in flight, dropping request"
            );
            return;
        }
        if first_pass && !self.downloading_allowed() {
            tracing::debug!(url = %url, "Downloading not allowed, dropping string fetch");
            return;
        }
        let Some(base) = self.servers.last() else {
            tracing::debug!(url = %url, "No mirrors known, dropping string fetch");
            return;
        };

        let full_url = join_url(base, &url);
        let transport = self.transport.clone();
        let completions = self.completions_tx.clone();
        let timeout = self.fetch_timeout;
        let tasks = &mut self.tasks;
        let target = full_url.clone();

        self.file_request.start(full_url, on_chunk, |request_id| {
            tasks.spawn(async move {
                let result = transport.get(&target, timeout).await;
                let _ = completions.send(Completion::Fetch { request_id, result });
            })
        });
    }
}
