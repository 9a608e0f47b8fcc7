//! Interactive line-based chat shell

use anyhow::Result;
use chrono::Utc;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use crate::{
    app::App,
    cli::render::Renderer,
    session::{ConversationError, Session, SubmitOutcome},
};

const HELP: &str = "\
Type a question and press Enter. Commands:
  /new              start a new conversation
  /sessions         list saved conversations
  /load <n|id>      resume a saved conversation
  /delete <n|id>    delete a saved conversation
  /history          show the current conversation
  /help             show this help
  /quit             exit";

/// A line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Message(String),
    New,
    Sessions,
    Load(String),
    Delete(String),
    History,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

/// Classify one line of input
pub fn parse_line(line: &str) -> ShellInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ShellInput::Empty;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return ShellInput::Message(trimmed.to_string());
    };

    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default().to_string();

    match (name, arg.is_empty()) {
        ("new", _) | ("clear", _) => ShellInput::New,
        ("sessions", _) | ("ls", _) => ShellInput::Sessions,
        ("load", false) => ShellInput::Load(arg),
        ("delete", false) | ("rm", false) => ShellInput::Delete(arg),
        ("history", _) => ShellInput::History,
        ("help", _) | ("?", _) => ShellInput::Help,
        ("quit", _) | ("exit", _) | ("q", _) => ShellInput::Quit,
        _ => ShellInput::Unknown(trimmed.to_string()),
    }
}

/// Resolve a 1-based list position, a full id, or a unique id prefix
pub fn resolve_session<'a>(sessions: &'a [Session], reference: &str) -> Option<&'a Session> {
    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= sessions.len() {
            return sessions.get(position - 1);
        }
    }

    if let Some(session) = sessions.iter().find(|session| session.id == reference) {
        return Some(session);
    }

    let mut matches = sessions.iter().filter(|session| session.id.starts_with(reference));
    match (matches.next(), matches.next()) {
        (Some(session), None) => Some(session),
        _ => None,
    }
}

/// Run the shell until `/quit` or end of input
pub async fn run(app: &mut App, renderer: &Renderer) -> Result<()> {
    println!("Tax assistant at {}. Type /help for commands.", app.backend().base_url());
    print!("{}", renderer.session_list(app.controller().sessions(), None, Utc::now()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("End of input");
            println!();
            break;
        };

        match parse_line(&line) {
            ShellInput::Empty => {}
            ShellInput::Message(text) => {
                println!("Thinking...");
                let controller = app.controller_mut();
                match controller.submit(&text).await {
                    Ok(SubmitOutcome::Ignored) => {}
                    Ok(_) => {
                        if let Some(turn) = controller.turns().last() {
                            println!("{}", renderer.turn(turn));
                        }
                    }
                    Err(e) => {
                        // The answer is in memory even though saving it failed
                        if let Some(turn) = controller.turns().last() {
                            println!("{}", renderer.turn(turn));
                        }
                        error!("Failed to save conversation: {}", e);
                        eprintln!("Warning: could not save this conversation: {}", e);
                    }
                }
            }
            ShellInput::New => {
                app.controller_mut().clear();
                println!("Started a new conversation.");
            }
            ShellInput::Sessions => {
                let controller = app.controller();
                print!(
                    "{}",
                    renderer.session_list(
                        controller.sessions(),
                        controller.active_session_id(),
                        Utc::now()
                    )
                );
            }
            ShellInput::Load(reference) => {
                let controller = app.controller_mut();
                let id = resolve_session(controller.sessions(), &reference).map(|s| s.id.clone());
                match id.map(|id| controller.load_session(&id)) {
                    Some(Ok(())) => {
                        println!("{}", renderer.transcript(controller.turns()));
                        println!(
                            "Resumed with {} earlier messages as context.",
                            controller.history().len()
                        );
                    }
                    Some(Err(e)) => eprintln!("{}", e),
                    None => eprintln!("No saved conversation matches '{}'", reference),
                }
            }
            ShellInput::Delete(reference) => {
                let controller = app.controller_mut();
                let Some(session) = resolve_session(controller.sessions(), &reference) else {
                    eprintln!("No saved conversation matches '{}'", reference);
                    continue;
                };
                let (id, title) = (session.id.clone(), session.title.clone());
                match controller.delete_session(&id).await {
                    Ok(_) => println!("Deleted \"{}\".", title),
                    Err(ConversationError::Store(e)) => {
                        eprintln!("Deleted \"{}\" but could not save the change: {}", title, e)
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            ShellInput::History => {
                let turns = app.controller().turns();
                if turns.is_empty() {
                    println!("Nothing yet. Ask a question to get started.");
                } else {
                    println!("{}", renderer.transcript(turns));
                }
            }
            ShellInput::Help => println!("{}", HELP),
            ShellInput::Quit => break,
            ShellInput::Unknown(input) => {
                eprintln!("Unknown command '{}'. Type /help for commands.", input)
            }
        }
    }

    Ok(())
}
