//! Where a sync pass gets its configuration from.
//!
//! Settings are loaded afresh at the start of every pass and every watcher
//! cycle, so edits to the configuration take effect without a restart.

use std::sync::RwLock;

use calsync_core::SyncSettings;

use crate::error::{ServerError, ServerResult};

/// Supplies the current [`SyncSettings`].
pub trait SettingsProvider: Send + Sync {
    /// Loads the settings as they are right now.
    fn load(&self) -> ServerResult<SyncSettings>;
}

/// Settings held in memory, replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticSettings {
    settings: RwLock<SyncSettings>,
}

impl StaticSettings {
    /// Creates a provider returning `settings`.
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Swaps in new settings for subsequent loads.
    pub fn replace(&self, settings: SyncSettings) -> ServerResult<()> {
        let mut current = self
            .settings
            .write()
            .map_err(|_| ServerError::config("settings lock poisoned"))?;
        *current = settings;
        Ok(())
    }
}

impl SettingsProvider for StaticSettings {
    fn load(&self) -> ServerResult<SyncSettings> {
        self.settings
            .read()
            .map(|settings| settings.clone())
            .map_err(|_| ServerError::config("settings lock poisoned"))
    }
}
