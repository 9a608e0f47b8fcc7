use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Args, Subcommand};

use crate::app::App;
use crate::cli::{render::Renderer, shell::resolve_session};

/// Manage saved conversations
#[derive(Args)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub command: Option<SessionsSubcommand>,
}

#[derive(Subcommand)]
pub enum SessionsSubcommand {
    /// List saved conversations, newest first
    List,
    /// Print a saved conversation
    Show {
        /// List position, id, or unique id prefix
        session: String,
    },
    /// Delete a saved conversation
    Delete {
        /// List position, id, or unique id prefix
        session: String,
    },
}

impl SessionsCommand {
    pub async fn execute(&self, app: &mut App, renderer: &Renderer) -> Result<()> {
        match self.command.as_ref().unwrap_or(&SessionsSubcommand::List) {
            SessionsSubcommand::List => {
                print!(
                    "{}",
                    renderer.session_list(app.controller().sessions(), None, Utc::now())
                );
            }
            SessionsSubcommand::Show { session } => {
                let found = resolve_session(app.controller().sessions(), session)
                    .ok_or_else(|| anyhow!("No saved conversation matches '{}'", session))?;
                println!("{}", renderer.session_detail(found));
            }
            SessionsSubcommand::Delete { session } => {
                let controller = app.controller_mut();
                let found = resolve_session(controller.sessions(), session)
                    .ok_or_else(|| anyhow!("No saved conversation matches '{}'", session))?;
                let (id, title) = (found.id.clone(), found.title.clone());

                controller.delete_session(&id).await?;
                println!("Deleted \"{}\".", title);
            }
        }

        Ok(())
    }
}
