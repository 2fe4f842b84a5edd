//! Configuration types for mapfiles-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for MapFilesDownloader
///
/// Only `meta_server_url` has no sensible default; everything else works out of
/// the box. A non-empty `servers` list (e.g. restored from a cached configuration)
/// makes the downloader start in the ready state without resolving mirrors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Metadata endpoint that returns the current mirror list
    ///
    /// Required unless a custom servers list source is supplied to the builder.
    #[serde(default)]
    pub meta_server_url: Option<String>,

    /// Initial mirror base URLs (empty = resolve on first download)
    #[serde(default)]
    pub servers: Vec<String>,

    /// Timeout for the mirror list request (default: 10 seconds)
    #[serde(default = "default_meta_timeout", with = "duration_serde")]
    pub meta_timeout: Duration,

    /// Timeout for string fetches and map file requests (default: 60 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// Directory map files are written to when a request has no destination
    /// (default: "./maps")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Retry behavior for the HTTP collaborators
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta_server_url: None,
            servers: Vec::new(),
            meta_timeout: default_meta_timeout(),
            download_timeout: default_download_timeout(),
            download_dir: default_download_dir(),
            event_buffer: default_event_buffer(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Check settings that would leave the downloader unusable
    ///
    /// `require_meta_url` is false when the caller provides its own mirror list
    /// source and the meta-server URL is never consulted.
    pub fn validate(&self, require_meta_url: bool) -> Result<()> {
        if require_meta_url {
            match self.meta_server_url.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(Error::config(
                        "meta_server_url",
                        "a meta server URL is required to resolve mirrors",
                    ));
                }
                Some(raw) => {
                    url::Url::parse(raw).map_err(|e| {
                        Error::config("meta_server_url", format!("'{raw}' is not a URL: {e}"))
                    })?;
                }
            }
        }

        if self.event_buffer == 0 {
            return Err(Error::config(
                "event_buffer",
                "event buffer must hold at least one event",
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff multiplier must be >= 1.0",
            ));
        }

        Ok(())
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_meta_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./maps")
}

fn default_event_buffer() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
