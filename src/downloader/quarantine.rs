//! Ordered holding area for requests that cannot be dispatched yet.

use crate::types::{FileId, QueuedFile};

/// FIFO of pending file requests, unique by id
///
/// Requests wait here while the mirror list is unknown or downloading is not
/// allowed. Entries leave either through [`drain`](Self::drain) (dispatch),
/// [`remove`](Self::remove) or [`clear`](Self::clear).
#[derive(Debug, Default)]
pub(crate) struct Quarantine {
    entries: Vec<QueuedFile>,
}

impl Quarantine {
    /// Append `file` to the tail
    ///
    /// Returns false (and leaves the queue untouched) if a request with the
    /// same id is already waiting.
    pub(crate) fn append(&mut self, file: QueuedFile) -> bool {
        if self.contains(&file.id) {
            return false;
        }
        self.entries.push(file);
        true
    }

    /// Remove the request with `id`, keeping the order of the rest
    pub(crate) fn remove(&mut self, id: &FileId) -> Option<QueuedFile> {
        let index = self.entries.iter().position(|entry| &entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Take every waiting request in insertion order, leaving the queue empty
    pub(crate) fn drain(&mut self) -> Vec<QueuedFile> {
        std::mem::take(&mut self.entries)
    }

    /// Drop every waiting request, returning how many there were
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(crate) fn contains(&self, id: &FileId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the waiting requests in dispatch order
    pub(crate) fn snapshot(&self) -> Vec<QueuedFile> {
        self.entries.clone()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str) -> QueuedFile {
        QueuedFile::new(id, format!("{id}.mwm"), 1)
    }

    fn ids(files: &[QueuedFile]) -> Vec<&str> {
        files.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut quarantine = Quarantine::default();
        assert!(quarantine.append(file("a")));
        assert!(quarantine.append(file("b")));
        assert!(quarantine.append(file("c")));

        assert_eq!(ids(&quarantine.snapshot()), vec!["a", "b", "c"]);
        assert_eq!(quarantine.len(), 3);
    }

    #[test]
    fn duplicate_id_is_ignored() {
        let mut quarantine = Quarantine::default();
        assert!(quarantine.append(file("a")));

        let mut newer = file("a");
        newer.data_version = 2;
        assert!(!quarantine.append(newer));

        assert_eq!(quarantine.len(), 1);
        assert_eq!(quarantine.snapshot()[0].data_version, 1, "first request wins");
    }

    #[test]
    fn remove_preserves_order_of_remaining() {
        let mut quarantine = Quarantine::default();
        for id in ["a", "b", "c"] {
            quarantine.append(file(id));
        }

        let removed = quarantine.remove(&FileId::new("b")).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(ids(&quarantine.snapshot()), vec!["a", "c"]);
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let mut quarantine = Quarantine::default();
        assert!(quarantine.remove(&FileId::new("x")).is_none());

        quarantine.append(file("a"));
        assert!(quarantine.remove(&FileId::new("x")).is_none());
        assert_eq!(quarantine.len(), 1);
    }

    #[test]
    fn drain_empties_queue_in_order() {
        let mut quarantine = Quarantine::default();
        for id in ["a", "b"] {
            quarantine.append(file(id));
        }

        let drained = quarantine.drain();
        assert_eq!(ids(&drained), vec!["a", "b"]);
        assert!(quarantine.is_empty());
        assert!(quarantine.drain().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut quarantine = Quarantine::default();
        quarantine.append(file("a"));
        quarantine.append(file("b"));

        assert_eq!(quarantine.clear(), 2);
        assert_eq!(quarantine.clear(), 0);
        assert!(quarantine.is_empty());
        assert!(!quarantine.contains(&FileId::new("a")));
    }
}
