//! Command implementations.

pub mod clear;
pub mod config;
pub mod list;
pub mod sync;
pub mod version;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use calsync_providers::{ReqwestTransport, SourceFetcher};
use calsync_server::{DesktopNotifier, JsonFileStore, LogNotifier, Notifier, Orchestrator};
use tracing::debug;

use crate::config::{ClientConfig, ConfigFileSettings};
use crate::error::{ClientError, ClientResult};

/// What every command gets: the loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub config_path: PathBuf,
}

impl Context {
    /// Loads the configuration at `path`, or the default path.
    ///
    /// An explicitly given file must exist; the default one may be missing.
    pub fn load(path: Option<PathBuf>) -> ClientResult<Self> {
        let (config, config_path) = match path {
            Some(path) => (
                ClientConfig::load_from(&path).map_err(ClientError::Config)?,
                path,
            ),
            None => {
                let path = ClientConfig::default_path();
                (
                    ClientConfig::load_or_default(&path).map_err(ClientError::Config)?,
                    path,
                )
            }
        };
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wires an orchestrator to the file store, the HTTP transport and the
    /// configured notifier.
    ///
    /// Settings are re-read from the configuration file on every pass.
    pub fn orchestrator(&self) -> ClientResult<Arc<Orchestrator>> {
        let data_dir = self.config.data_dir();
        debug!(data_dir = %data_dir.display(), "Opening store");
        let store = Arc::new(JsonFileStore::open(data_dir)?);

        let transport =
            ReqwestTransport::new().map_err(|e| ClientError::Config(e.to_string()))?;

        let notifier: Arc<dyn Notifier> = if self.config.notifications.enabled {
            Arc::new(DesktopNotifier::new())
        } else {
            Arc::new(LogNotifier)
        };

        let orchestrator = Orchestrator::new(
            Arc::new(ConfigFileSettings::new(&self.config_path)),
            Arc::new(SourceFetcher::new(transport)),
            store.clone(),
            store,
        )
        .with_notifier(notifier);

        Ok(Arc::new(orchestrator))
    }
}
