//! Configuration store
//!
//! Holds the last configuration confirmed by the backend (`remote`) and the
//! edit buffer (`local`). `remote` is only replaced by a full read or by a
//! fully successful reconciliation pass, never field by field.

use crate::backend::Backend;
use crate::config::AppConfig;
use crate::error::BackendError;

/// Stable value that is equal iff two configs are deep-equal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigSignature(String);

/// Compute the dirty-check signature of a config
pub fn signature(config: &AppConfig) -> ConfigSignature {
    // Field order is fixed by the struct definition, so the JSON form is canonical
    ConfigSignature(serde_json::to_string(config).unwrap_or_else(|_| format!("{:?}", config)))
}

#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    remote: AppConfig,
    local: AppConfig,
    baseline: ConfigSignature,
    loaded: bool,
}

impl ConfigurationStore {
    /// Store seeded with defaults; not yet loaded from the backend
    pub fn new() -> Self {
        let config = AppConfig::default();
        Self {
            baseline: signature(&config),
            remote: config.clone(),
            local: config,
            loaded: false,
        }
    }

    /// Fetch the full config from the backend and reset both copies to it
    pub async fn load_remote(&mut self, backend: &dyn Backend) -> Result<(), BackendError> {
        let config = backend.get_app_config().await?;
        self.replace_remote(config.clone());
        self.local = config;
        self.loaded = true;
        tracing::debug!("Loaded settings from backend");
        Ok(())
    }

    /// Apply a local-only change
    pub fn edit(&mut self, mutator: impl FnOnce(&mut AppConfig)) {
        mutator(&mut self.local);
    }

    pub fn local(&self) -> &AppConfig {
        &self.local
    }

    pub fn remote(&self) -> &AppConfig {
        &self.remote
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        signature(&self.local) != self.baseline
    }

    /// Record a fully applied config as the new remote baseline
    pub(crate) fn commit(&mut self, applied: AppConfig) {
        self.replace_remote(applied);
    }

    fn replace_remote(&mut self, config: AppConfig) {
        self.baseline = signature(&config);
        self.remote = config;
    }
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        Self::new()
    }
}
