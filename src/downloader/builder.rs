//! Construction with custom collaborators.

use super::MapFilesDownloader;
use super::owner::{Owner, OwnerParts};
use super::resolver::MirrorListResolver;
use crate::config::Config;
use crate::dispatch::{FileDispatcher, HttpFileDispatcher};
use crate::error::{Error, Result};
use crate::policy::DownloadingPolicy;
use crate::servers_list::{MetaServersListSource, ServersListSource};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for [`MapFilesDownloader`]
///
/// Any collaborator left unset falls back to the HTTP implementation built
/// from the [`Config`]. The meta-server URL is only required when no servers
/// list source is supplied.
///
/// ```no_run
/// use mapfiles_dl::{Config, MapFilesDownloader, TogglePolicy};
/// use std::sync::Arc;
///
/// # fn example() -> mapfiles_dl::Result<()> {
/// let policy = Arc::new(TogglePolicy::new(false));
/// let downloader = MapFilesDownloader::builder(Config {
///     meta_server_url: Some("https://meta.example.com/servers".into()),
///     ..Config::default()
/// })
/// .policy(policy.clone())
/// .build()?;
/// # Ok(())
/// # }
/// ```
pub struct MapFilesDownloaderBuilder {
    config: Config,
    servers_list_source: Option<Arc<dyn ServersListSource>>,
    dispatcher: Option<Arc<dyn FileDispatcher>>,
    transport: Option<Arc<dyn Transport>>,
    policy: Option<Arc<dyn DownloadingPolicy>>,
}

impl MapFilesDownloaderBuilder {
    /// Start from `config` with every collaborator defaulted
    pub fn new(config: Config) -> Self {
        Self {
            config,
            servers_list_source: None,
            dispatcher: None,
            transport: None,
            policy: None,
        }
    }

    /// Where the mirror list comes from
    pub fn servers_list_source(mut self, source: Arc<dyn ServersListSource>) -> Self {
        self.servers_list_source = Some(source);
        self
    }

    /// What performs map file downloads
    pub fn dispatcher(mut self, dispatcher: Arc<dyn FileDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Transport used for string fetches (and the default servers list source)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Gate consulted before starting transfers (default: always allowed)
    pub fn policy(mut self, policy: Arc<dyn DownloadingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Validate the configuration and start the owner task
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is unusable
    /// - [`Error::Network`] if the default HTTP client cannot be built
    /// - [`Error::Other`] if called outside a Tokio runtime
    pub fn build(self) -> Result<MapFilesDownloader> {
        self.config.validate(self.servers_list_source.is_none())?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("MapFilesDownloader needs a Tokio runtime: {e}")))?;

        // One connection pool shared by every default collaborator
        let http = if self.transport.is_none()
            || self.dispatcher.is_none()
            || self.servers_list_source.is_none()
        {
            Some(HttpTransport::new(self.config.retry.clone())?)
        } else {
            None
        };

        let transport: Arc<dyn Transport> = match (self.transport, &http) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(http.clone()),
            (None, None) => return Err(Error::Other("no transport available".into())),
        };

        let dispatcher: Arc<dyn FileDispatcher> = match (self.dispatcher, &http) {
            (Some(dispatcher), _) => dispatcher,
            (None, Some(http)) => Arc::new(HttpFileDispatcher::new(
                http.client().clone(),
                &self.config,
            )),
            (None, None) => return Err(Error::Other("no file dispatcher available".into())),
        };

        let source: Arc<dyn ServersListSource> = match self.servers_list_source {
            Some(source) => source,
            None => {
                let url = self.config.meta_server_url.clone().ok_or_else(|| {
                    Error::config("meta_server_url", "a meta server URL is required")
                })?;
                Arc::new(MetaServersListSource::new(
                    url,
                    self.config.meta_timeout,
                    transport.clone(),
                ))
            }
        };

        let (event_tx, _rx) = tokio::sync::broadcast::channel(self.config.event_buffer);
        let (commands, command_rx) = tokio::sync::mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let owner = Owner::new(OwnerParts {
            servers: self.config.servers.clone(),
            resolver: MirrorListResolver::new(source),
            dispatcher,
            transport,
            policy: self.policy,
            fetch_timeout: self.config.download_timeout,
            event_tx: event_tx.clone(),
        });
        let owner_task = runtime.spawn(owner.run(command_rx, shutdown.clone()));

        tracing::info!(
            servers = self.config.servers.len(),
            meta_server_url = ?self.config.meta_server_url,
            "Map files downloader started"
        );

        Ok(MapFilesDownloader {
            commands,
            event_tx,
            config: Arc::new(self.config),
            shutdown,
            owner_task: Arc::new(tokio::sync::Mutex::new(Some(owner_task))),
        })
    }
}
