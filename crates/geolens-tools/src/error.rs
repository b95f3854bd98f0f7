use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParams { tool_name: String, message: String },

    #[error("{tool_name} failed: {message}")]
    Execution { tool_name: String, message: String },

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("Unexpected error: {0}")]
    InternalError(String),
}

impl ToolError {
    pub fn execution<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::Execution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_params<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::InvalidParams {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Name of the tool the error belongs to, when known.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolError::UnknownTool(name) | ToolError::Cancelled(name) => Some(name),
            ToolError::InvalidParams { tool_name, .. } | ToolError::Execution { tool_name, .. } => {
                Some(tool_name)
            }
            ToolError::InternalError(_) => None,
        }
    }
}
