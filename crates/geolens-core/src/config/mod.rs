use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

pub mod credentials;
pub mod provider;

pub use credentials::{Credential, CredentialResolver, CredentialSource};
pub use provider::{ModelCatalog, ModelSelection, ProviderId};

pub const APP_DIR_NAME: &str = "geolens";
pub const SETTINGS_FILE: &str = "settings.toml";
pub const DEFAULT_MAX_STEPS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Settings for a model served outside the built-in providers, matched by
/// model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomModelSettings {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub endpoint: url::Url,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub providers: BTreeMap<ProviderId, ProviderSettings>,
    #[serde(default)]
    pub custom_models: Vec<CustomModelSettings>,
    /// When set, runs are delegated to this endpoint instead of executing locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSettings>,
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: None,
            default_model: None,
            max_steps: DEFAULT_MAX_STEPS,
            providers: BTreeMap::new(),
            custom_models: Vec::new(),
            remote: None,
        }
    }
}

impl Settings {
    /// Configured default selection, when both halves are present.
    pub fn preferred_selection(&self) -> Option<ModelSelection> {
        match (&self.default_provider, &self.default_model) {
            (Some(provider), Some(model)) => Some(ModelSelection::new(provider.clone(), model.clone())),
            _ => None,
        }
    }

    /// Selection for new sessions: the configured default if the catalog
    /// knows it, else the catalog's first entry, else the configured default
    /// as-is.
    pub fn default_selection(&self, catalog: &ModelCatalog) -> Result<ModelSelection> {
        let preferred = self.preferred_selection();
        catalog
            .default_selection(preferred.as_ref())
            .or(preferred)
            .ok_or_else(|| Error::Configuration("No model available to select".to_string()))
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if !path.exists() {
            debug!(target: "config", path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| Error::Configuration(format!("Failed to read settings file: {e}")))?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Configuration(format!("Failed to create config directory: {e}")))?;
        let contents = toml::to_string_pretty(self)?;
        fs::write(dir.join(SETTINGS_FILE), contents)
            .map_err(|e| Error::Configuration(format!("Failed to write settings file: {e}")))?;
        Ok(())
    }
}

/// `<platform config dir>/geolens`, created if missing.
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| Error::Configuration("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    fs::create_dir_all(&dir)
        .map_err(|e| Error::Configuration(format!("Failed to create config directory: {e}")))?;

    Ok(dir)
}
