use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::model::SessionRecord;
use crate::error::Result;
use crate::types::SessionId;

pub const CATALOG_FILE: &str = "sessions.json";

/// On-disk session catalog. Message logs, analysis results and tool data are
/// runtime-only and never written here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCatalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_id: Option<SessionId>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

impl SessionCatalog {
    /// A missing file is an empty catalog.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CATALOG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let catalog: Self = serde_json::from_str(&contents)?;
        debug!(target: "session::persist", sessions = catalog.sessions.len(), "Loaded session catalog");
        Ok(catalog)
    }

    /// Write via a temporary file so a crash never leaves a truncated catalog.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CATALOG_FILE);
        let tmp = dir.join(format!("{CATALOG_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        debug!(target: "session::persist", sessions = self.sessions.len(), "Saved session catalog");
        Ok(())
    }
}
