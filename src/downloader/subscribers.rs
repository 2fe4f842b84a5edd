//! Weakly-held event subscribers.
//!
//! The registry never keeps a subscriber alive: entries hold a [`Weak`]
//! reference and are pruned the first time a notification finds them dead.

use crate::types::Event;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;

/// Receives orchestrator events synchronously on the owner task
///
/// Implementations must return quickly and must not block; hand heavy work off
/// to another task. A subscriber that panics is unregistered and the panic does
/// not reach the orchestrator. For an async stream of events use
/// [`MapFilesDownloader::subscribe`](crate::MapFilesDownloader::subscribe).
pub trait Subscriber: Send + Sync {
    /// Called once per event, in emission order
    fn on_event(&self, event: &Event);
}

/// Handle returned by registration, used to unregister
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub u64);

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    entries: Vec<(SubscriberId, Weak<dyn Subscriber>)>,
    next_id: u64,
}

impl SubscriberRegistry {
    /// Register `subscriber`; registering the same object twice returns its existing id
    pub(crate) fn register(&mut self, subscriber: Weak<dyn Subscriber>) -> SubscriberId {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| Weak::ptr_eq(existing, &subscriber))
        {
            return *id;
        }

        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, subscriber));
        id
    }

    pub(crate) fn unregister(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Deliver `event` to every live subscriber in registration order
    pub(crate) fn notify(&mut self, event: &Event) {
        self.entries.retain(|(id, subscriber)| match subscriber.upgrade() {
            Some(subscriber) => {
                match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                    Ok(()) => true,
                    Err(_) => {
                        tracing::error!(subscriber = id.0, "Subscriber panicked, unregistering it");
                        false
                    }
                }
            }
            None => {
                tracing::debug!(subscriber = id.0, "Dropping released subscriber");
                false
            }
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
