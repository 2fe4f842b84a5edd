//! HTTP file dispatcher that writes map files to disk

use super::traits::FileDispatcher;
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::DownloadTask;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Suffix of the partial file while a transfer is running
const PARTIAL_SUFFIX: &str = "download";

/// Distinguishes partial files of concurrent transfers of the same file
static NEXT_TRANSFER: AtomicU64 = AtomicU64::new(0);

fn partial_path(dir: &Path, file_name: &str) -> PathBuf {
    let transfer = NEXT_TRANSFER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{file_name}.{transfer}.{PARTIAL_SUFFIX}"))
}

/// Streams map files into their destination directory
///
/// The body is written to `<file>.<n>.download` and renamed on success, so a
/// half-written file never carries the final name. Mirrors are tried primary
/// first, then in list order; each mirror gets the configured retries.
#[derive(Clone)]
pub struct HttpFileDispatcher {
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryConfig,
    default_dir: PathBuf,
}

impl HttpFileDispatcher {
    /// Create a dispatcher from the downloader configuration
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            timeout: config.download_timeout,
            retry: config.retry.clone(),
            default_dir: config.download_dir.clone(),
        }
    }

    async fn fetch_to_file(&self, url: &str, partial: &Path) -> Result<u64> {
        let mut response = self.client.get(url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// Primary URL first, then the remaining mirrors without repeating it
fn candidate_urls(task: &DownloadTask) -> Vec<&str> {
    let mut urls = vec![task.url.as_str()];
    urls.extend(
        task.mirror_urls
            .iter()
            .map(String::as_str)
            .filter(|url| *url != task.url),
    );
    urls
}

#[async_trait]
impl FileDispatcher for HttpFileDispatcher {
    async fn download(&self, task: DownloadTask) -> Result<PathBuf> {
        let dir = task
            .file
            .destination
            .clone()
            .unwrap_or_else(|| self.default_dir.clone());
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(&task.file.file_name);
        let partial = partial_path(&dir, &task.file.file_name);

        let candidates = candidate_urls(&task);
        let mut last_error = None;

        for url in candidates.iter().copied() {
            match with_retry(&self.retry, url, || self.fetch_to_file(url, &partial)).await {
                Ok(bytes) => {
                    tokio::fs::rename(&partial, &target).await?;
                    tracing::info!(
                        file_id = %task.file.id,
                        url,
                        bytes,
                        path = %target.display(),
                        "Map file downloaded"
                    );
                    return Ok(target);
                }
                Err(e) => {
                    tracing::warn!(file_id = %task.file.id, url, error = %e, "Mirror failed");
                    last_error = Some(e);
                }
            }
        }

        // Leftover partial data from the last mirror is useless
        let _ = tokio::fs::remove_file(&partial).await;

        Err(Error::AllMirrorsFailed {
            file_name: task.file.file_name.clone(),
            attempted: candidates.len(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no mirror URLs".to_string()),
        })
    }
}
