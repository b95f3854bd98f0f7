//! Resolves the API key and endpoint for one model call.
//!
//! Lookup order: per-call override, then stored provider settings, then a
//! custom-model entry matched by model name, then well-known environment
//! variables. The first source that yields an API key wins; the base URL
//! falls back along the same chain and finally to the provider's default.

use std::fmt;
use std::sync::Arc;
use strum_macros::Display;
use tracing::debug;

use super::provider::{ANTHROPIC_ID, GOOGLE_ID, OLLAMA_ID, OPENAI_ID, ProviderId};
use super::Settings;
use crate::error::{Error, Result};

pub type CredentialOverride = Arc<dyn Fn(&ProviderId) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CredentialSource {
    Override,
    ProviderSettings,
    CustomModel,
    Environment,
    /// Keyless local endpoint.
    None,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: Option<String>,
    pub base_url: String,
    pub source: CredentialSource,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("source", &self.source)
            .finish()
    }
}

pub(crate) trait EnvProvider: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

struct StdEnvProvider;

impl EnvProvider for StdEnvProvider {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

fn env_keys(provider: &ProviderId) -> &'static [&'static str] {
    match provider.as_str() {
        OPENAI_ID => &["OPENAI_API_KEY"],
        ANTHROPIC_ID => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        GOOGLE_ID => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        _ => &[],
    }
}

#[derive(Clone)]
pub struct CredentialResolver {
    settings: Arc<Settings>,
    override_fn: Option<CredentialOverride>,
    env_provider: Arc<dyn EnvProvider>,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("has_override", &self.override_fn.is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            override_fn: None,
            env_provider: Arc::new(StdEnvProvider),
        }
    }

    pub fn with_override(mut self, override_fn: CredentialOverride) -> Self {
        self.override_fn = Some(override_fn);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_env_provider(mut self, env_provider: Arc<dyn EnvProvider>) -> Self {
        self.env_provider = env_provider;
        self
    }

    pub fn resolve(&self, provider: &ProviderId, model: &str) -> Result<Credential> {
        let provider_settings = self.settings.providers.get(provider);
        let custom_model = self
            .settings
            .custom_models
            .iter()
            .find(|m| m.model == model);

        let (api_key, source) = if let Some(key) =
            self.override_fn.as_ref().and_then(|f| f(provider))
        {
            (Some(key), CredentialSource::Override)
        } else if let Some(key) = provider_settings.and_then(|p| p.api_key.clone()) {
            (Some(key), CredentialSource::ProviderSettings)
        } else if let Some(key) = custom_model.and_then(|m| m.api_key.clone()) {
            (Some(key), CredentialSource::CustomModel)
        } else if let Some(key) = env_keys(provider)
            .iter()
            .find_map(|k| self.env_provider.var(k))
        {
            (Some(key), CredentialSource::Environment)
        } else {
            (None, CredentialSource::None)
        };

        let base_url = provider_settings
            .and_then(|p| p.base_url.clone())
            .or_else(|| custom_model.and_then(|m| m.base_url.clone()))
            .or_else(|| provider.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "No endpoint configured for provider '{provider}' and model '{model}'"
                ))
            })?;

        // Only a local endpoint may be called without a key.
        let keyless_ok = provider.as_str() == OLLAMA_ID
            || (source == CredentialSource::None && custom_model.is_some());
        if api_key.is_none() && !keyless_ok {
            return Err(Error::Configuration(format!(
                "No API key found for provider '{provider}'"
            )));
        }

        debug!(target: "config::credentials", %provider, model, %source, "Resolved credential");
        Ok(Credential {
            api_key,
            base_url,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomModelSettings, ProviderSettings};
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestEnvProvider {
        vars: HashMap<String, String>,
    }

    impl EnvProvider for TestEnvProvider {
        fn var(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    fn resolver(settings: Settings) -> CredentialResolver {
        CredentialResolver::new(Arc::new(settings))
            .with_env_provider(Arc::new(TestEnvProvider::default()))
    }

    fn settings_with_everything() -> Settings {
        let mut settings = Settings::default();
        settings.providers.insert(
            ProviderId::from(OPENAI_ID),
            ProviderSettings {
                api_key: Some("stored-key".into()),
                base_url: None,
            },
        );
        settings.custom_models.push(CustomModelSettings {
            model: "gpt-4.1-mini".into(),
            provider: None,
            api_key: Some("custom-key".into()),
            base_url: Some("http://proxy/v1/chat/completions".into()),
        });
        settings
    }

    #[test]
    fn override_wins() {
        let resolver = resolver(settings_with_everything())
            .with_override(Arc::new(|p: &ProviderId| (p.as_str() == OPENAI_ID).then(|| "override-key".to_string())));

        let credential = resolver.resolve(&ProviderId::from(OPENAI_ID), "gpt-4.1-mini").unwrap();
        assert_eq!(credential.api_key.as_deref(), Some("override-key"));
        assert_eq!(credential.source, CredentialSource::Override);
        assert_eq!(credential.base_url, "http://proxy/v1/chat/completions");
    }

    #[test]
    fn provider_settings_beat_custom_model() {
        let credential = resolver(settings_with_everything())
            .resolve(&ProviderId::from(OPENAI_ID), "gpt-4.1-mini")
            .unwrap();
        assert_eq!(credential.api_key.as_deref(), Some("stored-key"));
        assert_eq!(credential.source, CredentialSource::ProviderSettings);
    }

    #[test]
    fn custom_model_matched_by_name() {
        let mut settings = settings_with_everything();
        settings.providers.clear();
        let credential = resolver(settings)
            .resolve(&ProviderId::from("acme"), "gpt-4.1-mini")
            .unwrap();
        assert_eq!(credential.api_key.as_deref(), Some("custom-key"));
        assert_eq!(credential.source, CredentialSource::CustomModel);
    }

    #[test]
    fn environment_is_last_resort() {
        let env = TestEnvProvider {
            vars: HashMap::from([("CLAUDE_API_KEY".to_string(), "env-key".to_string())]),
        };
        let resolver =
            CredentialResolver::new(Arc::new(Settings::default())).with_env_provider(Arc::new(env));
        let credential = resolver
            .resolve(&ProviderId::from(ANTHROPIC_ID), "claude-sonnet-4-5")
            .unwrap();
        assert_eq!(credential.api_key.as_deref(), Some("env-key"));
        assert_eq!(credential.source, CredentialSource::Environment);
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = resolver(Settings::default())
            .resolve(&ProviderId::from(OPENAI_ID), "gpt-4.1")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("openai")));
    }

    #[test]
    fn ollama_needs_no_key() {
        let credential = resolver(Settings::default())
            .resolve(&ProviderId::from(OLLAMA_ID), "qwen3")
            .unwrap();
        assert_eq!(credential.api_key, None);
        assert_eq!(credential.source, CredentialSource::None);
    }

    #[test]
    fn unknown_provider_without_endpoint_fails() {
        let err = resolver(Settings::default())
            .resolve(&ProviderId::from("acme"), "acme-1")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("endpoint")));
    }
}
