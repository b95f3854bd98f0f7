use serde::{Deserialize, Serialize};
use std::fmt;

pub const OPENAI_ID: &str = "openai";
pub const ANTHROPIC_ID: &str = "anthropic";
pub const GOOGLE_ID: &str = "google";
pub const OLLAMA_ID: &str = "ollama";

/// Identifier for a provider (built-in or custom).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Default chat-completions endpoint for providers that speak the
    /// OpenAI-compatible wire format without further configuration.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self.0.as_str() {
            OPENAI_ID => Some("https://api.openai.com/v1/chat/completions"),
            GOOGLE_ID => {
                Some("https://generativelanguage.googleapis.com/v1beta/openai/chat/completions")
            }
            ANTHROPIC_ID => Some("https://api.anthropic.com/v1/chat/completions"),
            OLLAMA_ID => Some("http://localhost:11434/v1/chat/completions"),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        ProviderId(s.to_string())
    }
}

pub fn openai() -> ProviderId {
    ProviderId::from(OPENAI_ID)
}

pub fn anthropic() -> ProviderId {
    ProviderId::from(ANTHROPIC_ID)
}

/// Provider + model pair a session runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub provider: ProviderId,
    pub model: String,
}

impl ModelSelection {
    pub fn new(provider: impl Into<ProviderId>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub provider: ProviderId,
    pub model: String,
    pub display_name: String,
}

/// Caller-supplied list of models the user may choose from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn contains(&self, selection: &ModelSelection) -> bool {
        self.entries
            .iter()
            .any(|e| e.provider == selection.provider && e.model == selection.model)
    }

    pub fn models_for(&self, provider: &ProviderId) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| &e.provider == provider)
    }

    /// Preferred selection, else the first catalog entry.
    pub fn default_selection(&self, preferred: Option<&ModelSelection>) -> Option<ModelSelection> {
        if let Some(preferred) = preferred {
            if self.contains(preferred) {
                return Some(preferred.clone());
            }
        }
        self.entries
            .first()
            .map(|e| ModelSelection::new(e.provider.clone(), e.model.clone()))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let entry = |provider: &str, model: &str, display_name: &str| CatalogEntry {
            provider: ProviderId::from(provider),
            model: model.to_string(),
            display_name: display_name.to_string(),
        };
        Self::new(vec![
            entry(OPENAI_ID, "gpt-4.1-mini", "GPT-4.1 mini"),
            entry(OPENAI_ID, "gpt-4.1", "GPT-4.1"),
            entry(ANTHROPIC_ID, "claude-sonnet-4-5", "Claude Sonnet 4.5"),
            entry(GOOGLE_ID, "gemini-2.5-flash", "Gemini 2.5 Flash"),
            entry(OLLAMA_ID, "qwen3", "Qwen 3 (local)"),
        ])
    }
}
