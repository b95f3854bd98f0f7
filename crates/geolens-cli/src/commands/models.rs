use async_trait::async_trait;
use eyre::Result;
use std::io::Write;

use super::Command;
use crate::workspace::Workspace;

pub struct ModelsCommand {
    pub workspace: Workspace,
}

#[async_trait]
impl Command for ModelsCommand {
    async fn execute(&self) -> Result<()> {
        let default = self.workspace.default_selection().ok();
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{:<2} {:<40} {:<30}", "", "Model", "Name")?;
        writeln!(stdout, "{}", "-".repeat(72))?;
        for entry in self.workspace.catalog().entries() {
            let marker = match &default {
                Some(d) if d.provider == entry.provider && d.model == entry.model => "*",
                _ => "",
            };
            writeln!(
                stdout,
                "{:<2} {:<40} {:<30}",
                marker,
                format!("{}/{}", entry.provider, entry.model),
                entry.display_name
            )?;
        }
        Ok(())
    }
}
