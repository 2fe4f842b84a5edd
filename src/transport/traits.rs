//! Transport trait

use async_trait::async_trait;
use std::time::Duration;

/// Performs a single HTTP GET and returns the whole body
///
/// Implementations own timeouts and retries; the caller only supplies the
/// per-request timeout. An empty body is a valid result and is treated by the
/// orchestrator the same way as a failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`, giving up after `timeout`
    async fn get(&self, url: &str, timeout: Duration) -> crate::Result<Vec<u8>>;
}
