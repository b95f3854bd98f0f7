//! Owns the set of sessions and the current-session pointer.
//!
//! The registry never holds zero sessions. Every operation is total: unknown
//! ids are ignored rather than reported as errors, and callers that need
//! confirmation re-read the registry afterwards.

use tracing::debug;

use super::model::{DEFAULT_SESSION_NAME, Session};
use crate::config::provider::ModelSelection;
use crate::types::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { repointed: bool },
    RefusedLastSession,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    current_session_id: SessionId,
}

impl SessionRegistry {
    /// Registry holding only the bootstrap session.
    pub fn new(selection: ModelSelection) -> Self {
        let session = Session::new(DEFAULT_SESSION_NAME, selection);
        Self {
            current_session_id: session.id.clone(),
            sessions: vec![session],
        }
    }

    /// Rebuild a registry from restored sessions. An empty list bootstraps a
    /// default session; a pointer that names no session is moved to the first.
    pub fn from_sessions(
        sessions: Vec<Session>,
        current: Option<SessionId>,
        fallback: ModelSelection,
    ) -> Self {
        if sessions.is_empty() {
            return Self::new(fallback);
        }

        let current_session_id = current
            .filter(|id| sessions.iter().any(|s| &s.id == id))
            .unwrap_or_else(|| sessions[0].id.clone());

        Self {
            sessions,
            current_session_id,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn current_session_id(&self) -> &SessionId {
        &self.current_session_id
    }

    /// The session the pointer names, if it exists. `switch_session` accepts
    /// unknown ids, so this can be `None`.
    pub fn current(&self) -> Option<&Session> {
        self.get(&self.current_session_id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Create a session at the head of the list and make it current.
    pub fn create_session(&mut self, name: Option<String>, selection: ModelSelection) -> SessionId {
        let session = Session::new(
            name.unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
            selection,
        );
        let id = session.id.clone();
        debug!(target: "session::registry", session_id = %id, "Creating session");
        self.sessions.insert(0, session);
        self.current_session_id = id.clone();
        id
    }

    /// Point at `id` without validating it.
    pub fn switch_session(&mut self, id: SessionId) {
        debug!(
            target: "session::registry",
            session_id = %id,
            known = self.contains(&id),
            "Switching current session"
        );
        self.current_session_id = id;
    }

    /// Returns whether a session was renamed.
    pub fn rename_session(&mut self, id: &SessionId, name: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(session) => {
                session.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Remove a session. The last remaining session is never removed, and if
    /// the current session goes the pointer moves to the first survivor
    /// within the same call.
    pub fn delete_session(&mut self, id: &SessionId) -> DeleteOutcome {
        let Some(index) = self.sessions.iter().position(|s| &s.id == id) else {
            return DeleteOutcome::NotFound;
        };
        if self.sessions.len() == 1 {
            debug!(target: "session::registry", session_id = %id, "Refusing to delete last session");
            return DeleteOutcome::RefusedLastSession;
        }

        self.sessions.remove(index);
        let repointed = &self.current_session_id == id;
        if repointed {
            self.current_session_id = self.sessions[0].id.clone();
        }
        debug!(target: "session::registry", session_id = %id, repointed, "Deleted session");
        DeleteOutcome::Deleted { repointed }
    }
}
