//! The shared, observable session store.
//!
//! All registry and session edits happen synchronously under one mutex. The
//! lock is never held across an await point. Tool-data writes and the run
//! finish/error commits go through the same lock, so for any one session they
//! are applied in some total order and neither can overwrite the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strum_macros::Display;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::Message;
use super::model::{AnalysisResult, Session, SessionRecord, UpsertOutcome};
use super::persist::SessionCatalog;
use super::registry::{DeleteOutcome, SessionRegistry};
use super::tool_cache::{self, ToolData, ToolDataUpdate};
use crate::config::ModelSelection;
use crate::reconcile;
use crate::transport::{SelectionSource, ToolCompletionSink};
use crate::types::{MessageId, RunId, SessionId, ToolCallId};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    CurrentSessionChanged { session_id: SessionId },
    SessionsChanged,
    /// `Completed`, `Cancelled` and `Errored` are each followed by `Idle`.
    RunStateChanged { state: RunState },
    PendingPromptChanged { text: String },
    MessagesReplaced { session_id: SessionId, version: u64 },
    AnalysisResultCommitted { session_id: SessionId, result_id: MessageId },
    ToolDataRecorded { session_id: SessionId, tool_call_id: ToolCallId },
}

#[derive(Debug)]
struct ActiveRun {
    run_id: RunId,
    session_id: SessionId,
    token: CancellationToken,
}

#[derive(Debug)]
struct StoreState {
    registry: SessionRegistry,
    run_state: RunState,
    active_run: Option<ActiveRun>,
    pending_prompt: String,
}

/// Result of trying to claim the store's single run slot.
#[derive(Debug)]
pub(crate) enum BeginRun {
    Began {
        run_id: RunId,
        token: CancellationToken,
        messages: Vec<Message>,
    },
    AlreadyRunning,
    NoSession,
    NothingToSend,
}

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<Mutex<StoreState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(selection: ModelSelection) -> Self {
        Self::from_registry(SessionRegistry::new(selection))
    }

    pub fn from_registry(registry: SessionRegistry) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(StoreState {
                registry,
                run_state: RunState::Idle,
                active_run: None,
                pending_prompt: String::new(),
            })),
            events,
        }
    }

    /// Restore persisted sessions with empty runtime state.
    pub fn from_catalog(catalog: SessionCatalog, fallback: ModelSelection) -> Self {
        let sessions = catalog
            .sessions
            .into_iter()
            .map(Session::from_record)
            .collect();
        Self::from_registry(SessionRegistry::from_sessions(
            sessions,
            catalog.current_session_id,
            fallback,
        ))
    }

    /// Persistable view of the registry. Runtime state is not included.
    pub fn catalog(&self) -> SessionCatalog {
        let state = self.lock();
        SessionCatalog {
            current_session_id: Some(state.registry.current_session_id().clone()),
            sessions: state.registry.sessions().iter().map(Session::record).collect(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // Registry operations

    pub fn create_session(&self, name: Option<String>, selection: ModelSelection) -> SessionId {
        let id = self.lock().registry.create_session(name, selection);
        self.emit(StoreEvent::SessionsChanged);
        self.emit(StoreEvent::CurrentSessionChanged {
            session_id: id.clone(),
        });
        id
    }

    /// Point the store at `id`. Unknown ids are accepted. An active run keeps
    /// delivering into the session it started in.
    pub fn switch_session(&self, id: SessionId) {
        let mut state = self.lock();
        if let Some(run) = &state.active_run {
            if run.session_id != id {
                debug!(
                    target: "session::store",
                    run_session = %run.session_id,
                    new_session = %id,
                    "Switching away from a session with an active run"
                );
            }
        }
        state.registry.switch_session(id.clone());
        drop(state);
        self.emit(StoreEvent::CurrentSessionChanged { session_id: id });
    }

    pub fn rename_session(&self, id: &SessionId, name: impl Into<String>) {
        if self.lock().registry.rename_session(id, name) {
            self.emit(StoreEvent::SessionsChanged);
        }
    }

    pub fn delete_session(&self, id: &SessionId) -> DeleteOutcome {
        let mut state = self.lock();
        let outcome = state.registry.delete_session(id);
        let current = state.registry.current_session_id().clone();
        drop(state);

        if let DeleteOutcome::Deleted { repointed } = outcome {
            self.emit(StoreEvent::SessionsChanged);
            if repointed {
                self.emit(StoreEvent::CurrentSessionChanged {
                    session_id: current,
                });
            }
        }
        outcome
    }

    pub fn set_session_model(&self, id: &SessionId, selection: ModelSelection) -> bool {
        let updated = match self.lock().registry.get_mut(id) {
            Some(session) => {
                session.set_selection(selection);
                true
            }
            None => false,
        };
        if updated {
            self.emit(StoreEvent::SessionsChanged);
        }
        updated
    }

    // Reads

    pub fn current_session_id(&self) -> SessionId {
        self.lock().registry.current_session_id().clone()
    }

    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.lock().registry.get(id).cloned()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.lock().registry.current().cloned()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.lock()
            .registry
            .sessions()
            .iter()
            .map(Session::record)
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn messages(&self, id: &SessionId) -> Option<Vec<Message>> {
        self.lock().registry.get(id).map(|s| s.messages().to_vec())
    }

    pub fn analysis_results(&self, id: &SessionId) -> Option<Vec<AnalysisResult>> {
        self.lock()
            .registry
            .get(id)
            .map(|s| s.analysis_results.clone())
    }

    pub fn tool_data(&self, id: &SessionId, tool_call_id: &ToolCallId) -> Option<ToolData> {
        tool_cache::get(&self.lock().registry, id, tool_call_id).cloned()
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    pub fn is_running(&self) -> bool {
        self.lock().active_run.is_some()
    }

    /// Session the active run delivers into, if any.
    pub fn running_session_id(&self) -> Option<SessionId> {
        self.lock().active_run.as_ref().map(|r| r.session_id.clone())
    }

    pub fn pending_prompt(&self) -> String {
        self.lock().pending_prompt.clone()
    }

    pub fn set_pending_prompt(&self, text: impl Into<String>) {
        let text = text.into();
        self.lock().pending_prompt.clone_from(&text);
        self.emit(StoreEvent::PendingPromptChanged { text });
    }

    // Message log

    /// Replace a session's log wholesale. Returns the new version, or `None`
    /// if the session does not exist.
    pub fn replace_messages(&self, id: &SessionId, messages: Vec<Message>) -> Option<u64> {
        let version = self
            .lock()
            .registry
            .get_mut(id)
            .map(|s| s.replace_messages(messages))?;
        self.emit(StoreEvent::MessagesReplaced {
            session_id: id.clone(),
            version,
        });
        Some(version)
    }

    /// Rebuild a session's analysis records from its log, keeping any error
    /// text already attached to a record. Returns the record count.
    pub fn reconcile_session(&self, id: &SessionId) -> Option<usize> {
        let mut state = self.lock();
        let session = state.registry.get_mut(id)?;
        session.analysis_results =
            reconcile::reconcile_with_existing(session.messages(), &session.analysis_results);
        let count = session.analysis_results.len();
        drop(state);
        self.emit(StoreEvent::SessionsChanged);
        Some(count)
    }

    /// Commit the final log of an exchange and record its analysis result.
    /// Idempotent: a record that already exists for the last prompt is left
    /// untouched, unless it holds the error of an earlier failed attempt.
    pub fn commit_finish(&self, id: &SessionId, final_log: Vec<Message>) -> Option<UpsertOutcome> {
        let mut state = self.lock();
        let outcome = Self::commit_finish_locked(&mut state, id, final_log);
        state.pending_prompt.clear();
        drop(state);

        let upsert = outcome.as_ref().map(|(_, _, upsert)| *upsert);
        self.emit_finish(id, outcome);
        upsert
    }

    fn emit_finish(&self, id: &SessionId, committed: Option<(u64, Option<MessageId>, UpsertOutcome)>) {
        if let Some((version, result_id, outcome)) = committed {
            self.emit(StoreEvent::MessagesReplaced {
                session_id: id.clone(),
                version,
            });
            if let (Some(result_id), UpsertOutcome::Inserted | UpsertOutcome::Updated) =
                (result_id, outcome)
            {
                self.emit(StoreEvent::AnalysisResultCommitted {
                    session_id: id.clone(),
                    result_id,
                });
            }
        }
        self.emit(StoreEvent::PendingPromptChanged {
            text: String::new(),
        });
    }

    fn commit_finish_locked(
        state: &mut StoreState,
        id: &SessionId,
        final_log: Vec<Message>,
    ) -> Option<(u64, Option<MessageId>, UpsertOutcome)> {
        let Some(session) = state.registry.get_mut(id) else {
            warn!(target: "session::store", session_id = %id, "Finished run for unknown session");
            return None;
        };
        let version = session.replace_messages(final_log);
        match reconcile::latest_result(session.messages()) {
            Some(result) => {
                let result_id = result.id.clone();
                let retried = session
                    .analysis_result(&result_id)
                    .is_some_and(|existing| existing.error_message.is_some());
                let outcome = if retried {
                    debug!(target: "session::store", session_id = %id, %result_id, "Replacing failed record after retry");
                    session.upsert_analysis_result(result)
                } else {
                    session.insert_analysis_result_if_absent(result)
                };
                Some((version, Some(result_id), outcome))
            }
            None => {
                warn!(target: "session::store", session_id = %id, "Final log has no user message");
                Some((version, None, UpsertOutcome::Unchanged))
            }
        }
    }

    /// Attach `error` to the record for the last prompt in the session's
    /// stored log, creating the record if needed.
    pub fn commit_error(&self, id: &SessionId, error: &str) -> Option<UpsertOutcome> {
        let mut state = self.lock();
        let outcome = Self::commit_error_locked(&mut state, id, error);
        drop(state);

        if let Some((result_id, _)) = &outcome {
            self.emit(StoreEvent::AnalysisResultCommitted {
                session_id: id.clone(),
                result_id: result_id.clone(),
            });
        }
        outcome.map(|(_, outcome)| outcome)
    }

    fn commit_error_locked(
        state: &mut StoreState,
        id: &SessionId,
        error: &str,
    ) -> Option<(MessageId, UpsertOutcome)> {
        let session = state.registry.get_mut(id)?;
        let Some(mut result) = reconcile::latest_result(session.messages()) else {
            warn!(target: "session::store", session_id = %id, %error, "Run failed with no prompt to attach the error to");
            return None;
        };
        result.error_message = Some(error.to_string());
        result.is_completed = false;
        let result_id = result.id.clone();
        Some((result_id, session.upsert_analysis_result(result)))
    }

    // Run slot

    /// Claim the run slot for `session_id`, appending the prompt (if any) to
    /// its log. `prompt` replaces the pending prompt only once the run has
    /// started; without one the pending prompt is used. The slot holds at
    /// most one token.
    pub(crate) fn begin_run(&self, session_id: &SessionId, prompt: Option<&str>) -> BeginRun {
        let mut state = self.lock();
        if state.active_run.is_some() {
            return BeginRun::AlreadyRunning;
        }

        let draft = prompt.unwrap_or(&state.pending_prompt).trim().to_string();
        let Some(session) = state.registry.get_mut(session_id) else {
            return BeginRun::NoSession;
        };

        let mut messages = session.messages().to_vec();
        if !draft.is_empty() {
            messages.push(Message::user(draft));
        } else if !messages.last().is_some_and(Message::is_user) {
            return BeginRun::NothingToSend;
        }
        let version = session.replace_messages(messages.clone());

        let run_id = RunId::new();
        let token = CancellationToken::new();
        state.active_run = Some(ActiveRun {
            run_id,
            session_id: session_id.clone(),
            token: token.clone(),
        });
        state.run_state = RunState::Running;
        if let Some(prompt) = prompt {
            state.pending_prompt = prompt.to_string();
        }
        drop(state);

        info!(target: "session::store", %run_id, %session_id, "Run started");
        if let Some(prompt) = prompt {
            self.emit(StoreEvent::PendingPromptChanged {
                text: prompt.to_string(),
            });
        }
        self.emit(StoreEvent::MessagesReplaced {
            session_id: session_id.clone(),
            version,
        });
        self.emit(StoreEvent::RunStateChanged {
            state: RunState::Running,
        });
        BeginRun::Began {
            run_id,
            token,
            messages,
        }
    }

    /// Replace the run's session log with an in-progress snapshot. Returns
    /// `false` once the run no longer owns the slot; nothing is written then.
    pub(crate) fn apply_run_messages(&self, run_id: RunId, messages: Vec<Message>) -> bool {
        let mut state = self.lock();
        let Some(session_id) = state
            .active_run
            .as_ref()
            .filter(|r| r.run_id == run_id && !r.token.is_cancelled())
            .map(|r| r.session_id.clone())
        else {
            return false;
        };
        let Some(version) = state
            .registry
            .get_mut(&session_id)
            .map(|s| s.replace_messages(messages))
        else {
            return false;
        };
        drop(state);

        self.emit(StoreEvent::MessagesReplaced {
            session_id,
            version,
        });
        true
    }

    /// Successful end of `run_id`. Commits and frees the slot only if the run
    /// still owns it.
    pub(crate) fn finish_run(&self, run_id: RunId, final_log: Vec<Message>) -> bool {
        let mut state = self.lock();
        let Some(run) = Self::take_run(&mut state, run_id) else {
            return false;
        };
        let committed = Self::commit_finish_locked(&mut state, &run.session_id, final_log);
        state.pending_prompt.clear();
        state.run_state = RunState::Idle;
        drop(state);

        info!(target: "session::store", %run_id, session_id = %run.session_id, "Run completed");
        self.emit_finish(&run.session_id, committed);
        self.emit_terminal(RunState::Completed);
        true
    }

    /// Failed end of `run_id`. The error is attached to the last prompt of the
    /// session's stored log.
    pub(crate) fn fail_run(&self, run_id: RunId, error: &str) -> bool {
        let mut state = self.lock();
        let Some(run) = Self::take_run(&mut state, run_id) else {
            return false;
        };
        let committed = Self::commit_error_locked(&mut state, &run.session_id, error);
        state.run_state = RunState::Idle;
        drop(state);

        warn!(target: "session::store", %run_id, session_id = %run.session_id, %error, "Run failed");
        if let Some((result_id, _)) = committed {
            self.emit(StoreEvent::AnalysisResultCommitted {
                session_id: run.session_id,
                result_id,
            });
        }
        self.emit_terminal(RunState::Errored);
        true
    }

    /// Signal the active run, if any, and free the slot. Streamed content
    /// stays in the log and no analysis record is written.
    pub fn cancel_run(&self) -> bool {
        let mut state = self.lock();
        let Some(run) = state.active_run.take() else {
            return false;
        };
        run.token.cancel();
        state.run_state = RunState::Idle;
        drop(state);

        info!(target: "session::store", run_id = %run.run_id, session_id = %run.session_id, "Run cancelled");
        self.emit_terminal(RunState::Cancelled);
        true
    }

    /// The run ended with a cancellation it did not get from `cancel_run`
    /// (for example a provider-side abort). Frees the slot without a record.
    pub(crate) fn release_cancelled_run(&self, run_id: RunId) -> bool {
        let mut state = self.lock();
        if Self::take_run(&mut state, run_id).is_none() {
            return false;
        }
        state.run_state = RunState::Idle;
        drop(state);
        self.emit_terminal(RunState::Cancelled);
        true
    }

    fn take_run(state: &mut StoreState, run_id: RunId) -> Option<ActiveRun> {
        if state.active_run.as_ref().is_some_and(|r| r.run_id == run_id) {
            state.active_run.take()
        } else {
            debug!(target: "session::store", %run_id, "Ignoring completion of a run that no longer owns the slot");
            None
        }
    }

    fn emit_terminal(&self, state: RunState) {
        self.emit(StoreEvent::RunStateChanged { state });
        self.emit(StoreEvent::RunStateChanged {
            state: RunState::Idle,
        });
    }
}

impl SelectionSource for SessionStore {
    fn current_selection(&self) -> Option<ModelSelection> {
        self.lock().registry.current().map(Session::selection)
    }
}

impl ToolCompletionSink for SessionStore {
    fn record_tool_completion(
        &self,
        session_id: &SessionId,
        tool_call_id: &ToolCallId,
        update: ToolDataUpdate,
    ) -> bool {
        let written = tool_cache::record(&mut self.lock().registry, session_id, tool_call_id, update);
        if written {
            self.emit(StoreEvent::ToolDataRecorded {
                session_id: session_id.clone(),
                tool_call_id: tool_call_id.clone(),
            });
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessagePart;

    fn store() -> SessionStore {
        SessionStore::new(ModelSelection::new("openai", "gpt-4.1-mini"))
    }

    fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn begin_run_appends_pending_prompt() {
        let store = store();
        let id = store.current_session_id();
        store.set_pending_prompt("  classify my data ");

        let BeginRun::Began { messages, .. } = store.begin_run(&id, None) else {
            panic!("run should start");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "classify my data");
        assert_eq!(store.messages(&id).unwrap(), messages);
        assert_eq!(store.run_state(), RunState::Running);
    }

    #[test]
    fn second_begin_is_rejected_and_first_token_survives() {
        let store = store();
        let id = store.current_session_id();
        store.set_pending_prompt("Q1");
        let BeginRun::Began { token, .. } = store.begin_run(&id, None) else {
            panic!("run should start");
        };

        store.set_pending_prompt("Q2");
        assert!(matches!(store.begin_run(&id, None), BeginRun::AlreadyRunning));
        assert!(!token.is_cancelled());
        assert_eq!(store.messages(&id).unwrap().len(), 1);
    }

    #[test]
    fn explicit_prompt_is_kept_only_when_the_run_starts() {
        let store = store();
        let id = store.current_session_id();
        let BeginRun::Began { token, .. } = store.begin_run(&id, Some("Q1")) else {
            panic!("run should start");
        };
        assert_eq!(store.pending_prompt(), "Q1");

        assert!(matches!(
            store.begin_run(&id, Some("Q2")),
            BeginRun::AlreadyRunning
        ));
        assert_eq!(store.pending_prompt(), "Q1");
        assert!(!token.is_cancelled());

        assert!(store.cancel_run());
        assert!(matches!(
            store.begin_run(&SessionId::from("missing"), Some("Q3")),
            BeginRun::NoSession
        ));
        assert_eq!(store.pending_prompt(), "Q1");
    }

    #[test]
    fn begin_without_prompt_or_session() {
        let store = store();
        let id = store.current_session_id();
        assert!(matches!(store.begin_run(&id, None), BeginRun::NothingToSend));

        store.set_pending_prompt("Q");
        assert!(matches!(
            store.begin_run(&SessionId::from("missing"), None),
            BeginRun::NoSession
        ));
        assert!(!store.is_running());
    }

    #[test]
    fn stale_run_cannot_write_after_cancel() {
        let store = store();
        let id = store.current_session_id();
        store.set_pending_prompt("Q");
        let BeginRun::Began {
            run_id,
            token,
            mut messages,
        } = store.begin_run(&id, None)
        else {
            panic!("run should start");
        };

        assert!(store.cancel_run());
        assert!(token.is_cancelled());
        assert!(!store.is_running());

        messages.push(Message::assistant(vec![MessagePart::text("late")]));
        assert!(!store.apply_run_messages(run_id, messages.clone()));
        assert!(!store.finish_run(run_id, messages));
        assert_eq!(store.messages(&id).unwrap().len(), 1);
        assert!(store.analysis_results(&id).unwrap().is_empty());
    }

    #[test]
    fn finish_commits_once_and_clears_prompt() {
        let store = store();
        let id = store.current_session_id();
        let mut rx = store.subscribe();
        store.set_pending_prompt("Q");
        let BeginRun::Began {
            run_id,
            mut messages,
            ..
        } = store.begin_run(&id, None)
        else {
            panic!("run should start");
        };
        messages.push(Message::assistant(vec![MessagePart::text("A")]));

        assert!(store.finish_run(run_id, messages.clone()));
        assert_eq!(store.commit_finish(&id, messages), Some(UpsertOutcome::Unchanged));

        let results = store.analysis_results(&id).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_completed);
        assert_eq!(store.pending_prompt(), "");
        assert_eq!(store.run_state(), RunState::Idle);

        let states: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                StoreEvent::RunStateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![RunState::Running, RunState::Completed, RunState::Idle]
        );
    }

    #[test]
    fn failure_attaches_error_to_stored_prompt() {
        let store = store();
        let id = store.current_session_id();
        store.set_pending_prompt("Q");
        let BeginRun::Began { run_id, .. } = store.begin_run(&id, None) else {
            panic!("run should start");
        };

        assert!(store.fail_run(run_id, "rate limited"));
        let results = store.analysis_results(&id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error_message.as_deref(), Some("rate limited"));
        assert!(!results[0].is_completed);
        // The prompt is kept so the user can retry.
        assert_eq!(store.pending_prompt(), "Q");
        assert!(!store.is_running());
    }

    #[test]
    fn run_keeps_writing_to_origin_after_switch() {
        let store = store();
        let origin = store.current_session_id();
        store.set_pending_prompt("Q");
        let BeginRun::Began {
            run_id,
            mut messages,
            ..
        } = store.begin_run(&origin, None)
        else {
            panic!("run should start");
        };

        let other = store.create_session(None, ModelSelection::new("anthropic", "claude-sonnet-4-5"));
        assert_eq!(store.current_session_id(), other);

        messages.push(Message::assistant(vec![MessagePart::text("A")]));
        assert!(store.apply_run_messages(run_id, messages));
        assert_eq!(store.messages(&origin).unwrap().len(), 2);
        assert!(store.messages(&other).unwrap().is_empty());
    }

    #[test]
    fn tool_completion_uses_store_lock() {
        let store = store();
        let id = store.current_session_id();
        let t1 = ToolCallId::from("t1");
        let mut data = ToolData::new();
        data.insert("x".into(), serde_json::json!(1));

        assert!(store.record_tool_completion(&id, &t1, ToolDataUpdate::replace(data)));
        assert!(!store.record_tool_completion(
            &SessionId::from("missing"),
            &t1,
            ToolDataUpdate::replace(ToolData::new())
        ));
        assert_eq!(store.tool_data(&id, &t1).unwrap()["x"], 1);
    }

    #[test]
    fn current_selection_follows_current_session() {
        let store = store();
        store.create_session(None, ModelSelection::new("anthropic", "claude-sonnet-4-5"));
        assert_eq!(
            store.current_selection(),
            Some(ModelSelection::new("anthropic", "claude-sonnet-4-5"))
        );
        store.switch_session(SessionId::from("missing"));
        assert_eq!(store.current_selection(), None);
    }
}
