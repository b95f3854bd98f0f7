use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Conversational spatial analysis from the terminal.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Directory holding settings.toml and sessions.json (defaults to the
    /// platform config directory)
    #[arg(long, env = "GEOLENS_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Send one prompt to the current (or given) session and stream the answer
    Ask {
        /// Prompt text; multiple words are joined with spaces
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Session to run in instead of the current one
        #[arg(long)]
        session: Option<String>,
        /// Forward the exchange to this endpoint instead of running locally
        #[arg(long)]
        remote: Option<Url>,
    },
    /// Manage analysis sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// List the models sessions can be pointed at
    Models,
}

#[derive(Subcommand, Clone)]
pub enum SessionCommands {
    /// List sessions, newest first
    List,
    /// Create a session and make it current
    Create {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Model as provider/model, e.g. openai/gpt-4.1-mini
        #[arg(long)]
        model: Option<String>,
    },
    /// Rename a session
    Rename { session_id: String, name: String },
    /// Delete a session (the last one is kept)
    Delete {
        session_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Make a session current
    Switch { session_id: String },
    /// Change the model of a session
    Model {
        /// Model as provider/model
        model: String,
        /// Session to change (defaults to the current one)
        #[arg(long)]
        session: Option<String>,
    },
}
