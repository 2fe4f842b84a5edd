//! Single in-flight string fetch with continuation support.
//!
//! Callers fetch small resources (metadata, manifests) relative to the current
//! mirror. Only one such fetch exists at a time: a new first-pass request is
//! dropped while the slot is occupied. A callback that returns `true` keeps the
//! slot reserved for a continuation request (`first_pass = false`), which
//! replaces whatever is in flight.

use crate::error::Result;
use tokio::task::AbortHandle;

/// Receives the body of a successful string fetch
///
/// Runs on the owner task. Return `true` to keep the request slot reserved for
/// a continuation, `false` to release it. Must not block.
pub type ChunkCallback = Box<dyn FnMut(&[u8]) -> bool + Send + 'static>;

/// A string fetch as submitted by the caller
pub(crate) struct FetchRequest {
    /// Path relative to the current mirror
    pub(crate) url: String,
    pub(crate) first_pass: bool,
    pub(crate) on_chunk: ChunkCallback,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("url", &self.url)
            .field("first_pass", &self.first_pass)
            .finish_non_exhaustive()
    }
}

/// What happened to a finished fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    /// Callback asked to keep the slot for a continuation
    Kept,
    /// Slot is free again
    Released,
    /// Result belongs to a request that was superseded; ignored
    Stale,
}

struct InFlight {
    id: u64,
    url: String,
    on_chunk: ChunkCallback,
    task: AbortHandle,
    /// Body delivered, callback asked for a continuation
    awaiting_continuation: bool,
}

#[derive(Default)]
pub(crate) struct SingleFlightFileRequest {
    current: Option<InFlight>,
    next_id: u64,
}

impl SingleFlightFileRequest {
    /// True while a fetch is running or a continuation is expected
    pub(crate) fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// Whether a request with this `first_pass` flag may start now
    pub(crate) fn accepts(&self, first_pass: bool) -> bool {
        !first_pass || self.current.is_none()
    }

    /// Absolute URL of the current fetch, if any
    pub(crate) fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|current| current.url.as_str())
    }

    /// Occupy the slot with a new fetch
    ///
    /// `spawn` receives the request id (to tag the completion with) and starts
    /// the transfer. A fetch already in the slot is aborted; its completion, if
    /// one still arrives, is reported as [`FetchOutcome::Stale`].
    pub(crate) fn start(
        &mut self,
        url: String,
        on_chunk: ChunkCallback,
        spawn: impl FnOnce(u64) -> AbortHandle,
    ) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        if let Some(previous) = self.current.take() {
            if !previous.awaiting_continuation {
                tracing::debug!(url = %previous.url, "Superseding in-flight string fetch");
            }
            previous.task.abort();
        }

        let task = spawn(id);
        self.current = Some(InFlight {
            id,
            url,
            on_chunk,
            task,
            awaiting_continuation: false,
        });
        id
    }

    /// Deliver the result of fetch `id`
    ///
    /// Empty bodies and errors are not forwarded to the callback and release
    /// the slot.
    pub(crate) fn complete(&mut self, id: u64, result: Result<Vec<u8>>) -> FetchOutcome {
        let Some(current) = self.current.as_mut().filter(|current| current.id == id) else {
            return FetchOutcome::Stale;
        };

        let keep = match result {
            Ok(body) if !body.is_empty() => (current.on_chunk)(&body),
            Ok(_) => {
                tracing::debug!(url = %current.url, "String fetch returned an empty body");
                false
            }
            Err(e) => {
                tracing::warn!(url = %current.url, error = %e, "String fetch failed");
                false
            }
        };

        if keep {
            current.awaiting_continuation = true;
            FetchOutcome::Kept
        } else {
            self.current = None;
            FetchOutcome::Released
        }
    }

    /// Abort whatever is in flight and free the slot
    pub(crate) fn cancel(&mut self) {
        if let Some(current) = self.current.take() {
            current.task.abort();
        }
    }
}
