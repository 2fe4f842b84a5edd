//! Shared test helpers: scripted collaborators and event waiting.

use crate::config::Config;
use crate::dispatch::FileDispatcher;
use crate::downloader::{MapFilesDownloader, Subscriber};
use crate::error::{Error, Result};
use crate::policy::DownloadingPolicy;
use crate::servers_list::ServersListSource;
use crate::transport::Transport;
use crate::types::{DownloadTask, Event, FileId, ServersList};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// How long helpers wait for an event before failing the test
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Servers list source whose answers are pushed by the test
///
/// Each `load()` waits for the next scripted response, so a resolution stays
/// in flight until the test calls [`respond`](Self::respond).
pub(crate) struct ScriptedServersSource {
    responses_tx: mpsc::UnboundedSender<Result<ServersList>>,
    responses_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<ServersList>>>,
    calls: AtomicUsize,
}

impl ScriptedServersSource {
    pub(crate) fn new() -> Self {
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        Self {
            responses_tx,
            responses_rx: tokio::sync::Mutex::new(responses_rx),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue the answer for the next (or currently waiting) `load()`
    pub(crate) fn respond(&self, response: Result<ServersList>) {
        self.responses_tx.send(response).unwrap();
    }

    /// Number of `load()` calls so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServersListSource for ScriptedServersSource {
    async fn load(&self) -> Result<ServersList> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses_rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(Error::EmptyServersList))
    }
}

/// Transport whose answers are pushed by the test; records requested URLs
pub(crate) struct ScriptedTransport {
    responses_tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
    responses_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        Self {
            responses_tx,
            responses_rx: tokio::sync::Mutex::new(responses_rx),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn respond(&self, response: Result<Vec<u8>>) {
        self.responses_tx.send(response).unwrap();
    }

    /// URLs requested so far, in order
    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        self.responses_rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Err(Error::Other("transport closed".into())))
    }
}

/// File dispatcher that records tasks and succeeds (or fails) immediately
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    tasks: Mutex<Vec<DownloadTask>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingDispatcher {
    pub(crate) fn tasks(&self) -> Vec<DownloadTask> {
        self.tasks.lock().unwrap().clone()
    }

    /// Make every following download fail with `message`
    pub(crate) fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl FileDispatcher for RecordingDispatcher {
    async fn download(&self, task: DownloadTask) -> Result<PathBuf> {
        let path = PathBuf::from("/maps").join(&task.file.file_name);
        self.tasks.lock().unwrap().push(task);
        match self.fail_with.lock().unwrap().clone() {
            Some(message) => Err(Error::Other(message)),
            None => Ok(path),
        }
    }
}

/// Synchronous subscriber that keeps every event it sees
#[derive(Default)]
pub(crate) struct RecordingSubscriber {
    events: Mutex<Vec<Event>>,
}

impl RecordingSubscriber {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Subscriber for RecordingSubscriber {
    fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// A downloader wired to scripted collaborators
pub(crate) struct TestHarness {
    pub(crate) downloader: MapFilesDownloader,
    pub(crate) source: Arc<ScriptedServersSource>,
    pub(crate) transport: Arc<ScriptedTransport>,
    pub(crate) dispatcher: Arc<RecordingDispatcher>,
    pub(crate) events: broadcast::Receiver<Event>,
}

/// Helper to create a downloader with scripted collaborators and the given initial mirrors
pub(crate) fn create_test_downloader(servers: &[&str]) -> TestHarness {
    create_test_downloader_with_policy(servers, None)
}

/// Like [`create_test_downloader`], with a downloading policy installed
pub(crate) fn create_test_downloader_with_policy(
    servers: &[&str],
    policy: Option<Arc<dyn DownloadingPolicy>>,
) -> TestHarness {
    let config = Config {
        servers: servers.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    };

    let source = Arc::new(ScriptedServersSource::new());
    let transport = Arc::new(ScriptedTransport::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let mut builder = MapFilesDownloader::builder(config)
        .servers_list_source(source.clone())
        .transport(transport.clone())
        .dispatcher(dispatcher.clone());
    if let Some(policy) = policy {
        builder = builder.policy(policy);
    }
    let downloader = builder.build().unwrap();
    let events = downloader.subscribe();

    TestHarness {
        downloader,
        source,
        transport,
        dispatcher,
        events,
    }
}

/// Wait for the next event
pub(crate) async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Wait for the first event matching `predicate`, discarding the rest
pub(crate) async fn wait_for_event(
    events: &mut broadcast::Receiver<Event>,
    predicate: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}

/// Collect ids from the next `count` `Dispatched` events, in order
pub(crate) async fn dispatched_ids(
    events: &mut broadcast::Receiver<Event>,
    count: usize,
) -> Vec<FileId> {
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        if let Event::Dispatched { id, .. } = next_event(events).await {
            ids.push(id);
        }
    }
    ids
}

/// Assert that no event arrives within a short window
pub(crate) async fn assert_no_event(events: &mut broadcast::Receiver<Event>) {
    assert_no_event_of(events, |_| true).await;
}

/// Assert that no event matching `predicate` arrives within a short window
pub(crate) async fn assert_no_event_of(
    events: &mut broadcast::Receiver<Event>,
    predicate: impl Fn(&Event) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        assert!(!predicate(&event), "unexpected event: {event:?}");
    }
}

/// Let spawned tasks run until `condition` holds
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Shorthand for a list of file ids
pub(crate) fn ids(ids: &[&str]) -> Vec<FileId> {
    ids.iter().map(|id| FileId::new(*id)).collect()
}
