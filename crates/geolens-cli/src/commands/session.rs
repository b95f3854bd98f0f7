use async_trait::async_trait;
use chrono::Local;
use eyre::{Result, eyre};
use std::io::{self, Write};

use super::Command;
use crate::cli::SessionCommands;
use crate::workspace::{Workspace, existing_session, parse_selection};
use geolens_core::session::{DeleteOutcome, SessionStore};

fn confirm_prompt(prompt: &str) -> Result<bool> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase().starts_with('y'))
}

pub struct SessionCommand {
    pub command: SessionCommands,
    pub workspace: Workspace,
}

#[async_trait]
impl Command for SessionCommand {
    async fn execute(&self) -> Result<()> {
        let store = self.workspace.open_store()?;
        let mut stdout = io::stdout();

        match &self.command {
            SessionCommands::List => return list(&store),
            SessionCommands::Create { name, model } => {
                let selection = match model {
                    Some(model) => parse_selection(model)?,
                    None => self.workspace.default_selection()?,
                };
                let id = store.create_session(name.clone(), selection);
                writeln!(stdout, "Created session {id}.")?;
            }
            SessionCommands::Rename { session_id, name } => {
                let id = existing_session(&store, session_id)?;
                store.rename_session(&id, name.as_str());
                writeln!(stdout, "Session {id} renamed to '{name}'.")?;
            }
            SessionCommands::Delete { session_id, force } => {
                let id = existing_session(&store, session_id)?;
                if !force
                    && !confirm_prompt(&format!(
                        "Are you sure you want to delete session {id}? (y/N): "
                    ))?
                {
                    writeln!(stdout, "Deletion cancelled.")?;
                    return Ok(());
                }
                match store.delete_session(&id) {
                    DeleteOutcome::Deleted { repointed: true } => writeln!(
                        stdout,
                        "Session {id} deleted. Current session is now {}.",
                        store.current_session_id()
                    )?,
                    DeleteOutcome::Deleted { repointed: false } => {
                        writeln!(stdout, "Session {id} deleted.")?;
                    }
                    DeleteOutcome::RefusedLastSession => {
                        return Err(eyre!("Session {id} is the only session and cannot be deleted"));
                    }
                    DeleteOutcome::NotFound => return Err(eyre!("Session not found: {id}")),
                }
            }
            SessionCommands::Switch { session_id } => {
                let id = existing_session(&store, session_id)?;
                store.switch_session(id.clone());
                writeln!(stdout, "Current session is now {id}.")?;
            }
            SessionCommands::Model { model, session } => {
                let id = match session {
                    Some(session) => existing_session(&store, session)?,
                    None => store.current_session_id(),
                };
                let selection = parse_selection(model)?;
                if !self.workspace.catalog().contains(&selection) {
                    tracing::warn!(
                        target: "geolens::session",
                        provider = %selection.provider,
                        model = %selection.model,
                        "Model is not in the catalog"
                    );
                }
                if !store.set_session_model(&id, selection) {
                    return Err(eyre!("Session not found: {id}"));
                }
                writeln!(stdout, "Session {id} now uses {model}.")?;
            }
        }

        self.workspace.save_store(&store)?;
        Ok(())
    }
}

fn list(store: &SessionStore) -> Result<()> {
    let current = store.current_session_id();
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "{:<2} {:<36} {:<30} {:<20} {:<36}",
        "", "ID", "Name", "Updated", "Model"
    )?;
    writeln!(stdout, "{}", "-".repeat(128))?;

    for session in store.sessions() {
        let marker = if session.id == current { "*" } else { "" };
        writeln!(
            stdout,
            "{:<2} {:<36} {:<30} {:<20} {:<36}",
            marker,
            session.id.as_str(),
            session.name,
            session
                .updated_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            format!("{}/{}", session.model_provider, session.model),
        )?;
    }
    Ok(())
}
