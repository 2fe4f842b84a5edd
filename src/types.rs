//! Core types for mapfiles-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils;

/// Ordered mirror base URLs; empty means "not resolved yet"
///
/// The last entry is the most recently validated mirror and is preferred for
/// new requests.
pub type ServersList = Vec<String>;

/// Caller-supplied identifier of a map file request (e.g. a country id)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Create a new FileId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One pending map file download
///
/// Carries everything needed to (re)start the download later: the file name
/// and data version determine the relative URL, `destination` is the directory
/// the file is written to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedFile {
    /// Unique request id
    pub id: FileId,
    /// File name on the mirrors, including extension (e.g. "Belarus.mwm")
    pub file_name: String,
    /// Map data version the file belongs to
    pub data_version: i64,
    /// Directory the downloaded file is written to (None = configured default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl QueuedFile {
    /// Create a request that downloads into the configured directory
    pub fn new(id: impl Into<FileId>, file_name: impl Into<String>, data_version: i64) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            data_version,
            destination: None,
        }
    }

    /// Set the directory the file is written to
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Path of this file relative to a mirror base URL
    pub fn relative_url(&self) -> String {
        utils::file_download_url(&self.file_name, self.data_version)
    }
}

/// A request handed to a [`FileDispatcher`](crate::dispatch::FileDispatcher)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    /// The request being dispatched
    pub file: QueuedFile,
    /// URL on the most recently known mirror; try this first
    pub url: String,
    /// Candidate URLs, one per mirror, in mirror list order
    pub mirror_urls: Vec<String>,
}

/// Observable state of the orchestrator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloaderState {
    /// No mirrors known, no resolution in flight
    Unresolved,
    /// Mirror list request outstanding
    Resolving,
    /// Mirrors known; downloads start immediately
    Ready,
}

/// Event emitted by the orchestrator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Request held in the quarantine until mirrors are known (or downloading is allowed)
    Quarantined {
        /// Request id
        id: FileId,
    },

    /// Request handed to the file dispatcher
    Dispatched {
        /// Request id
        id: FileId,
        /// Primary URL the download starts from
        url: String,
    },

    /// File dispatcher finished successfully
    DownloadComplete {
        /// Request id
        id: FileId,
        /// Where the file was written
        path: PathBuf,
    },

    /// File dispatcher gave up
    DownloadFailed {
        /// Request id
        id: FileId,
        /// Error message
        error: String,
    },

    /// Pending request removed before it was dispatched
    Removed {
        /// Request id
        id: FileId,
    },

    /// Quarantine emptied by the caller
    QuarantineCleared {
        /// Number of requests dropped
        count: usize,
    },

    /// New mirror list published
    ServersListResolved {
        /// Number of mirrors in the list
        servers: usize,
    },

    /// Mirror resolution attempt failed; pending requests stay quarantined
    ServersListFailed {
        /// Error message
        error: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_url_uses_version_and_encoded_name() {
        let file = QueuedFile::new("Cote d'Ivoire", "Cote d'Ivoire.mwm", 240105);

        assert_eq!(file.relative_url(), "maps/240105/Cote%20d%27Ivoire.mwm");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Dispatched {
            id: FileId::new("Belarus"),
            url: "https://m2.example.com/maps/1/Belarus.mwm".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "dispatched");
        assert_eq!(json["id"], "Belarus", "FileId is transparent");
    }

    #[test]
    fn queued_file_omits_missing_destination() {
        let json = serde_json::to_value(QueuedFile::new("a", "a.mwm", 1)).unwrap();
        assert!(json.get("destination").is_none());

        let with_dest = QueuedFile::new("a", "a.mwm", 1).with_destination("/tmp/maps");
        let restored: QueuedFile =
            serde_json::from_value(serde_json::to_value(&with_dest).unwrap()).unwrap();
        assert_eq!(restored, with_dest);
    }
}
