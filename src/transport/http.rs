//! `reqwest`-backed transport

use super::traits::Transport;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::retry::with_retry;
use async_trait::async_trait;
use std::time::Duration;

/// Transport backed by a shared `reqwest::Client`
///
/// Non-success status codes become [`Error::HttpStatus`]; server errors and
/// connection failures are retried according to the [`RetryConfig`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport with its own connection pool
    pub fn new(retry: RetryConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mapfiles-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, retry))
    }

    /// Create a transport that reuses an existing client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// The underlying client, for collaborators that stream responses
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get_once(&self, url: &str, timeout: Duration) -> crate::Result<Vec<u8>> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> crate::Result<Vec<u8>> {
        tracing::debug!(url, timeout_secs = timeout.as_secs(), "HTTP GET");
        with_retry(&self.retry, url, || self.get_once(url, timeout)).await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn get_returns_body_bytes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/countries.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Belarus\nLatvia"))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(no_retry()).unwrap();
        let body = transport
            .get(
                &format!("{}/data/countries.txt", mock_server.uri()),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(body, b"Belarus\nLatvia");
    }

    #[tokio::test]
    async fn get_maps_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(no_retry()).unwrap();
        let result = transport
            .get(&format!("{}/missing", mock_server.uri()), Duration::from_secs(5))
            .await;

        match result {
            Err(Error::HttpStatus { status, url }) => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing"), "got: {url}");
            }
            other => panic!("expected HttpStatus error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_retries_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let retry = RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(5),
            jitter: false,
            ..RetryConfig::default()
        };
        let transport = HttpTransport::new(retry).unwrap();
        let body = transport
            .get(&mock_server.uri(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(body, b"ok");
    }
}
