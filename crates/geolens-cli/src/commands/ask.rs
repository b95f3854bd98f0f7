use async_trait::async_trait;
use eyre::{Result, eyre};
use std::io::{self, Write};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use url::Url;

use super::Command;
use crate::workspace::{Workspace, existing_session};
use geolens_core::app::{AnalysisController, RunOutcome, StartOutcome};
use geolens_core::session::{Message, MessagePart, SessionStore, StoreEvent, ToolInvocationState};
use geolens_core::types::SessionId;

pub struct AskCommand {
    pub prompt: String,
    pub session: Option<String>,
    pub remote: Option<Url>,
    pub workspace: Workspace,
}

#[async_trait]
impl Command for AskCommand {
    async fn execute(&self) -> Result<()> {
        let store = self.workspace.open_store()?;
        if let Some(session) = &self.session {
            let id = existing_session(&store, session)?;
            store.switch_session(id);
        }
        let session_id = store.current_session_id();
        let transport = self.workspace.transport(&store, self.remote.clone())?;
        let controller = AnalysisController::new(store.clone(), transport);

        let mut events = store.subscribe();
        let handle = match controller.submit(self.prompt.clone()) {
            StartOutcome::Started(handle) => handle,
            StartOutcome::AlreadyRunning => return Err(eyre!("A run is already in progress")),
            StartOutcome::NoSession => return Err(eyre!("Session not found: {session_id}")),
            StartOutcome::NothingToSend => return Err(eyre!("Prompt is empty")),
        };

        let mut stdout = io::stdout();
        let mut printer = TranscriptPrinter::default();
        let wait = handle.wait();
        tokio::pin!(wait);

        let outcome = loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                event = events.recv() => match event {
                    Ok(StoreEvent::MessagesReplaced { session_id: id, .. }) if id == session_id => {
                        printer.print_latest(&mut stdout, &store, &session_id)?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(target: "geolens::ask", skipped, "Event receiver lagged");
                        printer.print_latest(&mut stdout, &store, &session_id)?;
                    }
                    _ => {}
                },
                _ = tokio::signal::ctrl_c() => {
                    controller.cancel();
                }
            }
        };
        printer.print_latest(&mut stdout, &store, &session_id)?;
        writeln!(stdout)?;

        self.workspace.save_store(&store)?;
        match outcome {
            RunOutcome::Completed => Ok(()),
            RunOutcome::Cancelled => {
                writeln!(stdout, "(cancelled)")?;
                Ok(())
            }
            RunOutcome::Errored(message) => Err(eyre!("Analysis failed: {message}")),
        }
    }
}

/// Writes the streamed assistant message incrementally. Tracks how far into
/// the part list (and into the current text part) output has got.
#[derive(Debug, Default)]
struct TranscriptPrinter {
    part: usize,
    offset: usize,
}

impl TranscriptPrinter {
    fn print_latest(
        &mut self,
        out: &mut impl Write,
        store: &SessionStore,
        session_id: &SessionId,
    ) -> io::Result<()> {
        let latest = store
            .messages(session_id)
            .and_then(|messages| messages.last().cloned());
        match latest {
            Some(message) if message.is_assistant() => self.print(out, &message),
            _ => Ok(()),
        }
    }

    fn print(&mut self, out: &mut impl Write, message: &Message) -> io::Result<()> {
        while let Some(part) = message.parts.get(self.part) {
            let is_last = self.part + 1 == message.parts.len();
            match part {
                MessagePart::Text { text } => {
                    if let Some(rest) = text.get(self.offset..) {
                        write!(out, "{rest}")?;
                    }
                    self.offset = text.len();
                    if is_last {
                        break;
                    }
                }
                MessagePart::ToolInvocation {
                    tool_name, state, ..
                } => {
                    let label = match state {
                        // Wait for the result before printing.
                        ToolInvocationState::Call if is_last => break,
                        ToolInvocationState::Call => "called",
                        ToolInvocationState::Result => "done",
                        ToolInvocationState::Error => "failed",
                    };
                    writeln!(out, "\n[{tool_name}: {label}]")?;
                }
                MessagePart::Reasoning { .. } | MessagePart::Data { .. } => {}
            }
            self.part += 1;
            self.offset = 0;
        }
        out.flush()
    }
}
