use clap::Parser;
use eyre::Result;

use geolens_cli::cli::{Cli, Commands};
use geolens_cli::commands::{
    Command, ask::AskCommand, models::ModelsCommand, session::SessionCommand,
};
use geolens_cli::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    geolens_cli::cli::config::load_env()?;

    let workspace = Workspace::load(cli.config_dir.clone())?;
    geolens_cli::logging::init_tracing(Some(&workspace.log_dir()))?;
    tracing::debug!(target: "geolens", dir = %workspace.dir().display(), "Using config directory");

    match cli.command {
        Commands::Ask {
            prompt,
            session,
            remote,
        } => {
            AskCommand {
                prompt: prompt.join(" "),
                session,
                remote,
                workspace,
            }
            .execute()
            .await
        }
        Commands::Session { command } => SessionCommand { command, workspace }.execute().await,
        Commands::Models => ModelsCommand { workspace }.execute().await,
    }
}
