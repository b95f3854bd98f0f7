//! Per-session side-channel data produced by tool executions, keyed by the
//! tool-call id the model assigned.
//!
//! These functions mutate a `SessionRegistry` directly. Concurrent callers go
//! through `SessionStore::record_tool_completion`, which holds the same lock
//! the controller's finish/error handlers take.

use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use super::registry::SessionRegistry;
use crate::types::{SessionId, ToolCallId};

pub type ToolData = Map<String, Value>;

/// Either a literal replacement or a pure `previous -> next` function.
pub enum ToolDataUpdate {
    Replace(ToolData),
    Update(Box<dyn FnOnce(ToolData) -> ToolData + Send>),
}

impl ToolDataUpdate {
    pub fn replace(data: ToolData) -> Self {
        Self::Replace(data)
    }

    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(ToolData) -> ToolData + Send + 'static,
    {
        Self::Update(Box::new(f))
    }

    /// Shallow merge of `data` over whatever is already recorded.
    pub fn merge(data: ToolData) -> Self {
        Self::update(move |mut previous| {
            previous.extend(data);
            previous
        })
    }

    fn apply(self, previous: Option<ToolData>) -> ToolData {
        match self {
            Self::Replace(data) => data,
            Self::Update(f) => f(previous.unwrap_or_default()),
        }
    }
}

impl fmt::Debug for ToolDataUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(data) => f.debug_tuple("Replace").field(data).finish(),
            Self::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Apply `update` to the entry for `tool_call_id` in `session_id`.
/// Returns `false` (and writes nothing) when the session does not exist.
pub fn record(
    registry: &mut SessionRegistry,
    session_id: &SessionId,
    tool_call_id: &ToolCallId,
    update: ToolDataUpdate,
) -> bool {
    let Some(session) = registry.get_mut(session_id) else {
        warn!(
            target: "session::tool_cache",
            session_id = %session_id,
            tool_call_id = %tool_call_id,
            "Dropping tool data for unknown session"
        );
        return false;
    };

    let previous = session.tool_additional_data.remove(tool_call_id);
    let next = update.apply(previous);
    debug!(
        target: "session::tool_cache",
        session_id = %session_id,
        tool_call_id = %tool_call_id,
        keys = next.len(),
        "Recorded tool data"
    );
    session
        .tool_additional_data
        .insert(tool_call_id.clone(), next);
    true
}

pub fn get<'a>(
    registry: &'a SessionRegistry,
    session_id: &SessionId,
    tool_call_id: &ToolCallId,
) -> Option<&'a ToolData> {
    registry
        .get(session_id)?
        .tool_additional_data
        .get(tool_call_id)
}
