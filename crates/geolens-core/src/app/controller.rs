use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::accumulator::ResponseAccumulator;
use crate::session::store::BeginRun;
use crate::session::{Message, SessionStore};
use crate::transport::{DeltaEvent, SubmitRequest, Transport, until_terminal};
use crate::types::{RunId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Errored(String),
}

/// Handle to a started run. Dropping it does not cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    session_id: SessionId,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn wait(self) -> RunOutcome {
        self.task
            .await
            .unwrap_or_else(|e| RunOutcome::Errored(format!("run task failed: {e}")))
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(RunHandle),
    /// Another run owns the store. It is left running.
    AlreadyRunning,
    NoSession,
    /// No pending prompt and the log does not end with an unanswered one.
    NothingToSend,
}

impl StartOutcome {
    pub fn into_handle(self) -> Option<RunHandle> {
        match self {
            Self::Started(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Drives one analysis run at a time against a [`SessionStore`].
#[derive(Clone)]
pub struct AnalysisController {
    store: SessionStore,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AnalysisController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisController")
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

impl AnalysisController {
    pub fn new(store: SessionStore, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start a run for `session_id` using the pending prompt. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self, session_id: &SessionId) -> StartOutcome {
        self.launch(session_id, None)
    }

    pub fn start_current(&self) -> StartOutcome {
        self.start(&self.store.current_session_id())
    }

    /// Start a run in the current session with `prompt`. The prompt becomes
    /// the pending prompt only if the run starts; a rejected submit leaves
    /// the store untouched.
    pub fn submit(&self, prompt: impl Into<String>) -> StartOutcome {
        let prompt = prompt.into();
        self.launch(&self.store.current_session_id(), Some(&prompt))
    }

    fn launch(&self, session_id: &SessionId, prompt: Option<&str>) -> StartOutcome {
        let (run_id, token, messages) = match self.store.begin_run(session_id, prompt) {
            BeginRun::Began {
                run_id,
                token,
                messages,
            } => (run_id, token, messages),
            BeginRun::AlreadyRunning => {
                debug!(target: "controller::start", %session_id, "Rejecting start while a run is active");
                return StartOutcome::AlreadyRunning;
            }
            BeginRun::NoSession => {
                debug!(target: "controller::start", %session_id, "No such session");
                return StartOutcome::NoSession;
            }
            BeginRun::NothingToSend => return StartOutcome::NothingToSend,
        };

        let span = info_span!("controller::run", %run_id, %session_id, transport = self.transport.name());
        let task = tokio::spawn(
            drive(
                self.store.clone(),
                Arc::clone(&self.transport),
                run_id,
                session_id.clone(),
                messages,
                token,
            )
            .instrument(span),
        );

        StartOutcome::Started(RunHandle {
            run_id,
            session_id: session_id.clone(),
            task,
        })
    }

    /// Signal the active run. Partial output already streamed stays in the
    /// log; no analysis record is written.
    pub fn cancel(&self) -> bool {
        self.store.cancel_run()
    }
}

async fn drive(
    store: SessionStore,
    transport: Arc<dyn Transport>,
    run_id: RunId,
    session_id: SessionId,
    messages: Vec<Message>,
    token: CancellationToken,
) -> RunOutcome {
    let request = SubmitRequest {
        session_id,
        messages: messages.clone(),
    };
    let mut deltas = until_terminal(transport.submit(request, token.clone()));
    let mut response = ResponseAccumulator::new();

    while let Some(event) = deltas.next().await {
        if token.is_cancelled() {
            break;
        }

        match event {
            DeltaEvent::StreamEnd => {
                let mut final_log = messages;
                final_log.push(response.into_message());
                return if store.finish_run(run_id, final_log) {
                    RunOutcome::Completed
                } else {
                    RunOutcome::Cancelled
                };
            }
            DeltaEvent::StreamError { error } if error.is_cancellation() => break,
            DeltaEvent::StreamError { error } => {
                let message = error.to_string();
                return if store.fail_run(run_id, &message) {
                    RunOutcome::Errored(message)
                } else {
                    RunOutcome::Cancelled
                };
            }
            delta => {
                if !response.apply(&delta) {
                    continue;
                }
                let mut snapshot = messages.clone();
                snapshot.push(response.message().clone());
                if !store.apply_run_messages(run_id, snapshot) {
                    debug!(target: "controller::run", "Run lost its slot; dropping remaining deltas");
                    break;
                }
            }
        }
    }

    if store.release_cancelled_run(run_id) {
        warn!(target: "controller::run", "Stream cancelled without a cancel request");
    }
    RunOutcome::Cancelled
}
