//! Message types for the per-session log.
//!
//! A `Message` is a role plus an ordered list of typed `MessagePart`s. Only
//! text parts carry meaning for reconciliation; every other part kind is kept
//! verbatim so the log round-trips through transports untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use strum_macros::Display;

use crate::types::{MessageId, ToolCallId};

/// Role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// Lifecycle of a tool invocation recorded inside an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInvocationState {
    Call,
    Result,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolInvocation {
        tool_call_id: ToolCallId,
        tool_name: String,
        args: Value,
        state: ToolInvocationState,
        /// Model-facing result once the tool has finished; error text for `Error`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// Any other fragment kind, carried through untouched.
    Data {
        kind: String,
        data: Value,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: MessageId,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub timestamp: u64,
}

impl Message {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            parts,
            timestamp: Self::current_timestamp(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![MessagePart::text(text)])
    }

    pub fn assistant(parts: Vec<MessagePart>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Concatenation of all text parts, in order, without a separator.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_text).collect()
    }

    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Last message with the user role, if any.
pub fn last_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.is_user())
}
