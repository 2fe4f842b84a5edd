//! Mirror list sources and the meta-server response format

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::ServersList;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Produces the current mirror list
///
/// A successful result must contain at least one base URL; implementations
/// report "nothing usable" as [`Error::EmptyServersList`].
#[async_trait]
pub trait ServersListSource: Send + Sync {
    /// Fetch and parse the mirror list
    async fn load(&self) -> Result<ServersList>;
}

/// Loads mirrors from a metadata endpoint through a [`Transport`]
pub struct MetaServersListSource {
    url: String,
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl MetaServersListSource {
    /// Create a source for `url`, bounded by `timeout` per request
    pub fn new(url: impl Into<String>, timeout: Duration, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            timeout,
            transport,
        }
    }
}

#[async_trait]
impl ServersListSource for MetaServersListSource {
    async fn load(&self) -> Result<ServersList> {
        let body = self.transport.get(&self.url, self.timeout).await?;
        let servers = parse_servers_list(&body)?;
        tracing::debug!(url = %self.url, servers = servers.len(), "Loaded servers list");
        Ok(servers)
    }
}

/// Parse a meta-server response into mirror base URLs
///
/// Two shapes are accepted:
/// - a JSON array of URL strings: `["https://a/", "https://b/"]`
/// - an object with a `servers` array: `{"servers": ["https://a/"], ...}`
///
/// Entries that are not absolute http(s) URLs are skipped. Order is preserved.
pub fn parse_servers_list(body: &[u8]) -> Result<ServersList> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyServersList);
    }

    let value: Value = serde_json::from_slice(body)?;
    let entries = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("servers") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::InvalidServersList(
                    "object response has no \"servers\" array".into(),
                ));
            }
        },
        _ => {
            return Err(Error::InvalidServersList(
                "expected a JSON array or object".into(),
            ));
        }
    };

    let servers: ServersList = entries
        .iter()
        .filter_map(|entry| {
            let raw = entry.as_str()?.trim();
            match url::Url::parse(raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(raw.to_string()),
                _ => {
                    tracing::debug!(entry = %entry, "Skipping unusable servers list entry");
                    None
                }
            }
        })
        .collect();

    if servers.is_empty() {
        return Err(Error::EmptyServersList);
    }

    Ok(servers)
}
