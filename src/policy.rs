//! Downloading policy gate
//!
//! Whether downloading is permitted right now (metered connection, user
//! setting, roaming) is decided outside this crate. The orchestrator only asks.

use std::sync::atomic::{AtomicBool, Ordering};

/// Decides whether map downloads may start
pub trait DownloadingPolicy: Send + Sync {
    /// Returns true if a new transfer may be started
    fn is_downloading_allowed(&self) -> bool;
}

/// Policy backed by a flag the application flips at runtime
///
/// After switching from disallowed to allowed, call
/// [`MapFilesDownloader::retry_pending`](crate::MapFilesDownloader::retry_pending)
/// so requests parked while downloading was disallowed get dispatched.
#[derive(Debug)]
pub struct TogglePolicy {
    allowed: AtomicBool,
}

impl TogglePolicy {
    /// Create a policy with the given initial answer
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed: AtomicBool::new(allowed),
        }
    }

    /// Change the answer
    pub fn set_allowed(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

impl Default for TogglePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DownloadingPolicy for TogglePolicy {
    fn is_downloading_allowed(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_policy_reflects_latest_value() {
        let policy = TogglePolicy::new(false);
        assert!(!policy.is_downloading_allowed());

        policy.set_allowed(true);
        assert!(policy.is_downloading_allowed());
        assert!(TogglePolicy::default().is_downloading_allowed());
    }
}
