use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::openai::OpenAiChatProvider;
use crate::api::provider::Provider;
use crate::config::{Credential, ProviderId};

/// Builds a provider client from a resolved credential. The local transport
/// calls this once per model step, so implementations should be cheap.
pub trait ProviderFactory: Send + Sync + 'static {
    fn create(
        &self,
        provider: &ProviderId,
        credential: &Credential,
    ) -> Result<Arc<dyn Provider>, ApiError>;
}

/// Every built-in provider is reached through its OpenAI-compatible
/// chat-completions surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        provider: &ProviderId,
        credential: &Credential,
    ) -> Result<Arc<dyn Provider>, ApiError> {
        let client = OpenAiChatProvider::new(
            provider.as_str(),
            credential.api_key.as_deref(),
            credential.base_url.clone(),
        )?;
        Ok(Arc::new(client))
    }
}
