use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use geolens_core::api::DefaultProviderFactory;
use geolens_core::config::{
    CredentialResolver, ModelCatalog, ModelSelection, RemoteSettings, Settings, config_dir,
};
use geolens_core::session::{SessionCatalog, SessionStore};
use geolens_core::tools::builtin_registry;
use geolens_core::transport::{LocalTransport, RemoteTransport, Transport};
use geolens_core::types::SessionId;

const SYSTEM_PROMPT: &str = "You are a spatial data analyst. Answer concisely, \
call tools for any computation over attribute values, and explain the numbers they return.";

/// Config directory plus the settings loaded from it.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    settings: Settings,
    catalog: ModelCatalog,
}

impl Workspace {
    pub fn load(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => config_dir()?,
        };
        let settings = Settings::load(&dir)?;
        Ok(Self {
            dir,
            settings,
            catalog: ModelCatalog::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn default_selection(&self) -> Result<ModelSelection> {
        Ok(self.settings.default_selection(&self.catalog)?)
    }

    pub fn open_store(&self) -> Result<SessionStore> {
        let catalog = SessionCatalog::load(&self.dir)?;
        Ok(SessionStore::from_catalog(catalog, self.default_selection()?))
    }

    pub fn save_store(&self, store: &SessionStore) -> Result<()> {
        store.catalog().save(&self.dir)?;
        Ok(())
    }

    /// Remote when an endpoint is given or configured, otherwise local.
    pub fn transport(&self, store: &SessionStore, remote: Option<Url>) -> Result<Arc<dyn Transport>> {
        let remote = match remote {
            Some(endpoint) => Some(RemoteSettings {
                endpoint,
                headers: self
                    .settings
                    .remote
                    .as_ref()
                    .map(|r| r.headers.clone())
                    .unwrap_or_default(),
            }),
            None => self.settings.remote.clone(),
        };

        if let Some(remote) = remote {
            let transport = RemoteTransport::from_settings(&remote)
                .map_err(|e| Error::Config(e.to_string()))?;
            return Ok(Arc::new(transport));
        }

        let transport = LocalTransport::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            CredentialResolver::new(Arc::new(self.settings.clone())),
            Arc::new(DefaultProviderFactory),
            Arc::new(builtin_registry()),
        )
        .with_system_prompt(SYSTEM_PROMPT)
        .with_max_steps(self.settings.max_steps);
        Ok(Arc::new(transport))
    }
}

/// Parse `provider/model`. Everything after the first slash is the model name.
pub fn parse_selection(value: &str) -> Result<ModelSelection> {
    match value.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok(ModelSelection::new(provider, model))
        }
        _ => Err(Error::Config(format!(
            "Expected a model as provider/model, got '{value}'"
        ))),
    }
}

/// Resolve a user-supplied session id against the store.
pub fn existing_session(store: &SessionStore, id: &str) -> Result<SessionId> {
    let id = SessionId::from(id);
    if store.session(&id).is_some() {
        Ok(id)
    } else {
        Err(Error::SessionNotFound(id.to_string()))
    }
}
