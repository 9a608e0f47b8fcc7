//! Plain-text rendering of turns and session lists

use chrono::{DateTime, Utc};
use crossterm::style::Stylize;
use std::fmt::Write;

use crate::{
    backend::{provider::utils::sanitize_content, Role},
    session::{Session, Turn},
    utils::text::{format, string},
};

const INDENT: &str = "  ";

/// Formats conversation output for the terminal
#[derive(Debug, Clone)]
pub struct Renderer {
    width: usize,
    color: bool,
}

impl Renderer {
    pub fn new(width: usize, color: bool) -> Self {
        Self { width, color }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if !self.color {
            return text.to_string();
        }

        match style {
            Style::User => text.cyan().bold().to_string(),
            Style::Assistant => text.green().bold().to_string(),
            Style::Error => text.red().to_string(),
            Style::Heading => text.yellow().to_string(),
            Style::Dim => text.dark_grey().to_string(),
        }
    }

    fn wrap_into(&self, out: &mut String, text: &str, indent: &str) {
        let width = self.width.saturating_sub(indent.len()).max(10);
        for paragraph in sanitize_content(text).lines() {
            if paragraph.trim().is_empty() {
                out.push('\n');
                continue;
            }
            for line in string::word_wrap(paragraph, width) {
                let _ = writeln!(out, "{}{}", indent, line);
            }
        }
    }

    /// Render one turn including its match panels
    pub fn turn(&self, turn: &Turn) -> String {
        let mut out = String::new();

        let label = match turn.role {
            Role::User => self.paint("You", Style::User),
            Role::Assistant => self.paint("Assistant", Style::Assistant),
        };
        match turn.confidence {
            Some(confidence) => {
                let _ = writeln!(
                    out,
                    "{} {}",
                    label,
                    self.paint(
                        &format!("(confidence {})", format::format_percent(confidence)),
                        Style::Dim
                    )
                );
            }
            None => {
                let _ = writeln!(out, "{}", label);
            }
        }

        if turn.error {
            let _ = writeln!(out, "{}{}", INDENT, self.paint(&turn.content, Style::Error));
            return out;
        }

        self.wrap_into(&mut out, &turn.content, INDENT);

        if !turn.has_matches() {
            return out;
        }

        if !turn.relevant_sections.is_empty() {
            let _ = writeln!(out, "{}{}", INDENT, self.paint("Relevant sections:", Style::Heading));
            for section in &turn.relevant_sections {
                let _ = writeln!(
                    out,
                    "{}{}§ {} {} ({}%)",
                    INDENT,
                    INDENT,
                    section.section,
                    section.title,
                    section.score_percent()
                );
                if !section.summary.is_empty() {
                    self.wrap_into(&mut out, &section.summary, "      ");
                }
            }
        }

        if !turn.relevant_articles.is_empty() {
            let _ = writeln!(out, "{}{}", INDENT, self.paint("Related articles:", Style::Heading));
            for article in &turn.relevant_articles {
                let mut byline = article.title.clone();
                if !article.author.is_empty() {
                    let _ = write!(byline, " - {}", article.author);
                }
                if !article.date.is_empty() {
                    let _ = write!(byline, ", {}", article.date);
                }
                if !article.related_section.is_empty() {
                    let _ = write!(byline, " (§ {})", article.related_section);
                }
                let _ = writeln!(out, "{}{}{}", INDENT, INDENT, byline);
                if !article.snippet.is_empty() {
                    self.wrap_into(&mut out, &article.snippet, "      ");
                }
            }
        }

        out
    }

    /// Render every turn of a conversation
    pub fn transcript(&self, turns: &[Turn]) -> String {
        turns
            .iter()
            .map(|turn| self.turn(turn))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbered session list, newest first, marking the active one
    pub fn session_list(
        &self,
        sessions: &[Session],
        active_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        if sessions.is_empty() {
            return format!(
                "{}\n",
                self.paint("No previous chats. Start a conversation to see it here.", Style::Dim)
            );
        }

        let title_width = self.width.saturating_sub(40).max(20);
        let mut out = String::new();
        for (index, session) in sessions.iter().enumerate() {
            let marker = if active_id == Some(session.id.as_str()) { "*" } else { " " };
            let _ = writeln!(
                out,
                "{}{:>3}. {}  {}",
                marker,
                index + 1,
                string::truncate(&session.title, title_width),
                self.paint(
                    &format!(
                        "[{} turns, {}, {}]",
                        session.messages.len(),
                        format::format_age(session.timestamp, now),
                        short_id(&session.id)
                    ),
                    Style::Dim
                )
            );
        }
        out
    }

    /// Header plus transcript of one session
    pub fn session_detail(&self, session: &Session) -> String {
        format!(
            "{}\n{}\n\n{}",
            self.paint(&session.title, Style::Heading),
            self.paint(
                &format!("{} - {}", session.id, session.timestamp.to_rfc3339()),
                Style::Dim
            ),
            self.transcript(&session.messages)
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    User,
    Assistant,
    Error,
    Heading,
    Dim,
}

/// First eight characters of a session id
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}
