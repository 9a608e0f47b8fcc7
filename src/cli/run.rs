use anyhow::{anyhow, Result};
use clap::Args;
use std::io::{self, Read};
use tracing::{debug, error, info};

use crate::app::App;
use crate::cli::{render::Renderer, shell::resolve_session};
use crate::session::{ConversationError, SubmitOutcome};
use crate::utils::text::string;

/// Ask a single question non-interactively
#[derive(Args)]
pub struct AskCommand {
    /// The question to ask. If not provided, will read from stdin
    pub question: Vec<String>,

    /// Continue a saved conversation (list position, id, or id prefix)
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,
}

impl AskCommand {
    pub async fn execute(&self, app: &mut App, renderer: &Renderer) -> Result<()> {
        debug!("Executing ask command");

        let question = self.get_question()?;

        if question.trim().is_empty() {
            return Err(anyhow!("No question provided. Use arguments or pipe input via stdin."));
        }

        info!(
            "Asking: {}",
            string::truncate(&string::normalize_whitespace(&question), 50)
        );

        let controller = app.controller_mut();

        if let Some(reference) = &self.session {
            let id = resolve_session(controller.sessions(), reference)
                .map(|session| session.id.clone())
                .ok_or_else(|| anyhow!("No saved conversation matches '{}'", reference))?;
            controller.load_session(&id)?;
        }

        let result = controller.submit(&question).await;

        // A failed save still leaves the answer in memory
        if let Some(turn) = controller.turns().last() {
            print!("{}", renderer.turn(turn));
        }

        match result {
            Ok(SubmitOutcome::Failed) => Err(anyhow!("The assistant backend did not answer")),
            Ok(_) => Ok(()),
            Err(ConversationError::Store(e)) => {
                error!("Failed to save conversation: {}", e);
                eprintln!("Warning: could not save this conversation: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_question(&self) -> Result<String> {
        if !self.question.is_empty() {
            // Join all arguments into a single question
            Ok(self.question.join(" "))
        } else {
            debug!("Reading question from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
            Ok(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ask(question: &str) -> AskCommand {
        AskCommand {
            question: vec![question.to_string()],
            session: None,
        }
    }

    async fn app_for(server: &MockServer, config: Config) -> App {
        App::new(
            Config {
                api_base_url: server.uri(),
                ..config
            },
            false,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_answer_kept_when_history_cannot_be_saved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "Deductions up to 1.5 lakh."})),
            )
            .mount(&server)
            .await;

        // A regular file where the data directory should be
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let config = Config {
            data_dir: blocker.join("taxbot"),
            ..Config::default()
        };

        let mut app = app_for(&server, config).await;
        let result = ask("What is Section 80C?")
            .execute(&mut app, &Renderer::new(80, false))
            .await;

        assert!(result.is_ok());
        let turns = app.controller().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "Deductions up to 1.5 lakh.");
        assert!(!turns[1].error);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let temp_dir = tempdir().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let mut app = app_for(&server, config).await;
        let result = ask("Is HRA taxable?")
            .execute(&mut app, &Renderer::new(80, false))
            .await;

        assert!(result.is_err());
        assert!(app.controller().turns()[1].error);
        assert!(app.controller().sessions().is_empty());
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_session_reference() {
        let server = MockServer::start().await;
        let temp_dir = tempdir().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let mut app = app_for(&server, config).await;
        let command = AskCommand {
            question: vec!["Follow up".to_string()],
            session: Some("7".to_string()),
        };

        assert!(command.execute(&mut app, &Renderer::new(80, false)).await.is_err());
        assert!(app.controller().turns().is_empty());
        app.shutdown().await.unwrap();
    }
}
