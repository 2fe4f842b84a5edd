//! Mirror list resolution with an in-flight latch.
//!
//! At most one request to the [`ServersListSource`] is outstanding at any time.
//! The latch is set when a resolution task is spawned and released by the
//! owner task when the result arrives. If the task dies without reporting
//! (aborted, panicked), a drop guard reports [`Error::ResolutionAborted`]
//! instead, so the latch can never stay set forever.

use super::owner::Completion;
use crate::error::{Error, Result};
use crate::servers_list::ServersListSource;
use crate::types::ServersList;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub(crate) struct MirrorListResolver {
    source: Arc<dyn ServersListSource>,
    in_flight: bool,
}

impl MirrorListResolver {
    pub(crate) fn new(source: Arc<dyn ServersListSource>) -> Self {
        Self {
            source,
            in_flight: false,
        }
    }

    /// True while a resolution task is outstanding
    pub(crate) fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Start a resolution unless one is already running
    ///
    /// Returns true if a new task was spawned. The result is delivered as
    /// [`Completion::ServersList`] on `completions`.
    pub(crate) fn resolve(
        &mut self,
        tasks: &mut JoinSet<()>,
        completions: &mpsc::UnboundedSender<Completion>,
    ) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;

        let source = self.source.clone();
        let guard = CompletionGuard::new(completions.clone());
        tasks.spawn(async move {
            let result = source.load().await;
            guard.complete(result);
        });
        true
    }

    /// Release the latch and interpret a resolution result
    ///
    /// An empty list counts as a failure.
    pub(crate) fn finish(&mut self, result: Result<ServersList>) -> Result<ServersList> {
        self.in_flight = false;
        match result {
            Ok(servers) if servers.is_empty() => Err(Error::EmptyServersList),
            other => other,
        }
    }
}

/// Sends exactly one [`Completion::ServersList`], even if the task is dropped early
struct CompletionGuard {
    completions: Option<mpsc::UnboundedSender<Completion>>,
}

impl CompletionGuard {
    fn new(completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            completions: Some(completions),
        }
    }

    fn complete(mut self, result: Result<ServersList>) {
        if let Some(tx) = self.completions.take() {
            // Receiver gone means the owner task has stopped
            let _ = tx.send(Completion::ServersList(result));
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.completions.take() {
            let _ = tx.send(Completion::ServersList(Err(Error::ResolutionAborted)));
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::test_helpers::ScriptedServersSource;
    use std::time::Duration;

    async fn next_result(rx: &mut mpsc::UnboundedReceiver<Completion>) -> Result<ServersList> {
        let completion = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for resolution")
            .expect("completion channel closed");
        match completion {
            Completion::ServersList(result) => result,
            _ => panic!("unexpected completion kind"),
        }
    }

    #[tokio::test]
    async fn second_resolve_is_coalesced() {
        let source = Arc::new(ScriptedServersSource::new());
        let mut resolver = MirrorListResolver::new(source.clone());
        let mut tasks = JoinSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(resolver.resolve(&mut tasks, &tx));
        assert!(resolver.in_flight());
        assert!(!resolver.resolve(&mut tasks, &tx), "latch must block a second request");

        source.respond(Ok(vec!["http://m1/".into()]));
        let result = next_result(&mut rx).await;
        let servers = resolver.finish(result).unwrap();

        assert_eq!(servers, vec!["http://m1/"]);
        assert!(!resolver.in_flight());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_list_is_failure() {
        let source = Arc::new(ScriptedServersSource::new());
        let mut resolver = MirrorListResolver::new(source.clone());
        let mut tasks = JoinSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        resolver.resolve(&mut tasks, &tx);
        source.respond(Ok(Vec::new()));
        let result = next_result(&mut rx).await;

        assert!(matches!(resolver.finish(result), Err(Error::EmptyServersList)));
        assert!(!resolver.in_flight());
        assert!(resolver.resolve(&mut tasks, &tx), "failure releases the latch");
    }

    #[tokio::test]
    async fn aborted_task_reports_resolution_aborted() {
        let source = Arc::new(ScriptedServersSource::new());
        let mut resolver = MirrorListResolver::new(source);
        let mut tasks = JoinSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        resolver.resolve(&mut tasks, &tx);
        // never answered: abort the pending load
        tasks.abort_all();

        let result = next_result(&mut rx).await;
        assert!(matches!(result, Err(Error::ResolutionAborted)));
        assert!(resolver.finish(result).is_err());
        assert!(!resolver.in_flight());
    }
}
