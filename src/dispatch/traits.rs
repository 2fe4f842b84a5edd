//! File dispatcher trait

use crate::types::DownloadTask;
use async_trait::async_trait;
use std::path::PathBuf;

/// Performs one map file download
///
/// `task.url` points at the most recently known mirror and should be tried
/// first; `task.mirror_urls` lists every mirror for fallback.
#[async_trait]
pub trait FileDispatcher: Send + Sync {
    /// Download the file and return where it was written
    async fn download(&self, task: DownloadTask) -> crate::Result<PathBuf>;
}
