//! Error types for mapfiles-dl
//!
//! Network unavailability is an expected condition for a map downloader, so
//! most of the orchestrator degrades to "no-op" or "retry later" instead of
//! surfacing these errors. They show up where a caller can act on them:
//! - handle operations once the owner task has shut down
//! - the default HTTP collaborators (transport, mirror list, file dispatch)
//! - configuration validation

use thiserror::Error;

/// Result type alias for mapfiles-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mapfiles-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "meta_server_url")
        key: Option<String>,
    },

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Mirror list response could not be interpreted
    #[error("invalid servers list: {0}")]
    InvalidServersList(String),

    /// Mirror list response parsed but contained no usable mirror
    #[error("servers list contains no usable mirrors")]
    EmptyServersList,

    /// Mirror resolution task ended without reporting a result
    #[error("servers list resolution aborted")]
    ResolutionAborted,

    /// Every candidate mirror failed for a file download
    #[error("all {attempted} mirrors failed for {file_name}: {last_error}")]
    AllMirrorsFailed {
        /// The file that could not be downloaded
        file_name: String,
        /// Number of mirror URLs that were tried
        attempted: usize,
        /// Error reported by the last mirror tried
        last_error: String,
    },

    /// Shutdown in progress - the owner task no longer accepts commands
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key() {
        let err = Error::config("meta_server_url", "must not be empty");

        match &err {
            Error::Config { message, key } => {
                assert_eq!(message, "must not be empty");
                assert_eq!(key.as_deref(), Some("meta_server_url"));
            }
            other => panic!("expected Config error, got: {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "configuration error: must not be empty",
            "display should only include the message"
        );
    }

    #[test]
    fn all_mirrors_failed_message_names_file() {
        let err = Error::AllMirrorsFailed {
            file_name: "Belarus.mwm".into(),
            attempted: 2,
            last_error: "HTTP 404".into(),
        };

        let msg = err.to_string();
        assert!(msg.contains("Belarus.mwm"), "got: {msg}");
        assert!(msg.contains("2 mirrors"), "got: {msg}");
    }

    #[test]
    fn io_error_converts_with_question_mark() {
        fn open_missing() -> Result<()> {
            std::fs::File::open("/definitely/not/here/map.mwm")?;
            Ok(())
        }

        assert!(matches!(open_missing(), Err(Error::Io(_))));
    }
}
