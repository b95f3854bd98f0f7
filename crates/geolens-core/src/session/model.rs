use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::message::{Message, MessagePart};
use crate::config::provider::{ModelSelection, ProviderId};
use crate::types::{MessageId, SessionId, ToolCallId};

pub const DEFAULT_SESSION_NAME: &str = "New analysis";

/// Durable prompt/response record correlated to one user message.
///
/// `id` is always the id of the originating user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: MessageId,
    pub prompt: String,
    pub response: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub is_completed: bool,
}

/// Persistable subset of a session. Runtime state (messages, results, tool
/// data) is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: String,
    pub model_provider: ProviderId,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub model_provider: ProviderId,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analysis_results: Vec<AnalysisResult>,
    pub tool_additional_data: HashMap<ToolCallId, Map<String, Value>>,
    messages: Vec<Message>,
    messages_version: u64,
}

impl Session {
    pub fn new(name: impl Into<String>, selection: ModelSelection) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name: name.into(),
            model_provider: selection.provider,
            model: selection.model,
            created_at: now,
            updated_at: now,
            analysis_results: Vec::new(),
            tool_additional_data: HashMap::new(),
            messages: Vec::new(),
            messages_version: 0,
        }
    }

    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            model_provider: record.model_provider,
            model: record.model,
            created_at: record.created_at,
            updated_at: record.updated_at,
            analysis_results: Vec::new(),
            tool_additional_data: HashMap::new(),
            messages: Vec::new(),
            messages_version: 0,
        }
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            model_provider: self.model_provider.clone(),
            model: self.model.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn selection(&self) -> ModelSelection {
        ModelSelection::new(self.model_provider.clone(), self.model.clone())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Incremented on every whole-log replacement.
    pub fn messages_version(&self) -> u64 {
        self.messages_version
    }

    /// Replace the message log wholesale and return the new version.
    pub fn replace_messages(&mut self, messages: Vec<Message>) -> u64 {
        self.messages = messages;
        self.messages_version += 1;
        self.touch();
        self.messages_version
    }

    pub fn analysis_result(&self, id: &MessageId) -> Option<&AnalysisResult> {
        self.analysis_results.iter().find(|r| &r.id == id)
    }

    /// Insert `result` unless a record with the same id already exists.
    pub fn insert_analysis_result_if_absent(&mut self, result: AnalysisResult) -> UpsertOutcome {
        if self.analysis_result(&result.id).is_some() {
            return UpsertOutcome::Unchanged;
        }
        self.analysis_results.push(result);
        self.touch();
        UpsertOutcome::Inserted
    }

    /// Insert `result`, or overwrite the record sharing its id in place.
    pub fn upsert_analysis_result(&mut self, result: AnalysisResult) -> UpsertOutcome {
        self.touch();
        match self
            .analysis_results
            .iter_mut()
            .find(|r| r.id == result.id)
        {
            Some(existing) => {
                *existing = result;
                UpsertOutcome::Updated
            }
            None => {
                self.analysis_results.push(result);
                UpsertOutcome::Inserted
            }
        }
    }

    pub fn set_selection(&mut self, selection: ModelSelection) {
        self.model_provider = selection.provider;
        self.model = selection.model;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, prompt: &str) -> AnalysisResult {
        AnalysisResult {
            id: MessageId::from(id),
            prompt: prompt.to_string(),
            response: vec![],
            error_message: None,
            is_completed: false,
        }
    }

    fn session() -> Session {
        Session::new("test", ModelSelection::new("openai", "gpt-4.1-mini"))
    }

    #[test]
    fn replace_messages_bumps_version() {
        let mut session = session();
        assert_eq!(session.messages_version(), 0);
        assert_eq!(session.replace_messages(vec![Message::user("a")]), 1);
        assert_eq!(session.replace_messages(vec![]), 2);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn upsert_updates_in_place() {
        let mut session = session();
        assert_eq!(
            session.upsert_analysis_result(result("u1", "first")),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            session.upsert_analysis_result(result("u1", "second")),
            UpsertOutcome::Updated
        );
        assert_eq!(session.analysis_results.len(), 1);
        assert_eq!(session.analysis_results[0].prompt, "second");
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let mut session = session();
        session.insert_analysis_result_if_absent(result("u1", "first"));
        assert_eq!(
            session.insert_analysis_result_if_absent(result("u1", "second")),
            UpsertOutcome::Unchanged
        );
        assert_eq!(session.analysis_results[0].prompt, "first");
    }

    #[test]
    fn record_round_trip_drops_runtime_state() {
        let mut session = session();
        session.replace_messages(vec![Message::user("hello")]);
        session.upsert_analysis_result(result("u1", "hello"));

        let restored = Session::from_record(session.record());
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.name, "test");
        assert!(restored.messages().is_empty());
        assert!(restored.analysis_results.is_empty());
    }
}
