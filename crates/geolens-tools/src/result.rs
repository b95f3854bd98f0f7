use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a tool hands back after executing.
///
/// `primary` is returned to the model. `side_channel` never reaches the model;
/// it is recorded against the tool-call id so the rest of the application can
/// pick up derived artifacts (class breaks, plot specs, fitted coefficients).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub primary: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_channel: Option<Map<String, Value>>,
}

impl ToolOutput {
    pub fn new(primary: impl Into<Value>) -> Self {
        Self {
            primary: primary.into(),
            side_channel: None,
        }
    }

    pub fn with_side_channel(mut self, data: Map<String, Value>) -> Self {
        self.side_channel = Some(data);
        self
    }

    /// Split into the model-facing result and the side-channel payload.
    pub fn into_parts(self) -> (Value, Option<Map<String, Value>>) {
        (self.primary, self.side_channel)
    }
}
