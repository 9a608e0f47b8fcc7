//! Turns and sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    backend::{
        types::null_as_empty, ArticleMatch, ChatResponse, HistoryEntry, Role, SectionMatch,
    },
    utils::text::string,
};

/// Text shown in place of an answer when the backend call fails
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Number of characters of the opening question kept in a session title
pub const TITLE_MAX_CHARS: usize = 50;

/// One message in a conversation. Turns are appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relevant_sections: Vec<SectionMatch>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relevant_articles: Vec<ArticleMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            error: false,
            relevant_sections: Vec::new(),
            relevant_articles: Vec::new(),
            confidence: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Assistant turn carrying everything the backend returned
    pub fn from_response(response: ChatResponse) -> Self {
        Self {
            relevant_sections: response.relevant_sections,
            relevant_articles: response.relevant_articles,
            confidence: response.confidence,
            ..Self::new(Role::Assistant, response.response)
        }
    }

    /// The synthetic assistant turn recorded when a request fails
    pub fn apology() -> Self {
        Self {
            error: true,
            ..Self::new(Role::Assistant, APOLOGY_TEXT.to_string())
        }
    }

    pub fn has_matches(&self) -> bool {
        !self.relevant_sections.is_empty() || !self.relevant_articles.is_empty()
    }
}

/// Reduce displayed turns to the history the backend is sent.
///
/// Error turns are not real answers, so they are dropped together with the
/// user turn they stood in for; what remains keeps role and text only.
pub fn project_history(turns: &[Turn]) -> Vec<HistoryEntry> {
    turns
        .iter()
        .enumerate()
        .filter(|(index, turn)| {
            let answered_by_error = turn.role == Role::User
                && turns.get(index + 1).map_or(false, |next| next.error);
            !turn.error && !answered_by_error
        })
        .map(|(_, turn)| HistoryEntry {
            role: turn.role,
            content: turn.content.clone(),
        })
        .collect()
}

/// A persisted, resumable conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Turn>,
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// Create a session titled after the question that opened it
    pub fn new(first_message: &str, messages: Vec<Turn>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title_for(first_message),
            messages,
            timestamp: Utc::now(),
        }
    }

    /// Replace the recorded turns wholesale
    pub fn replace_messages(&mut self, messages: Vec<Turn>) {
        self.messages = messages;
    }
}

/// Session title: the first 50 characters of the message, `...` if cut
pub fn title_for(message: &str) -> String {
    string::ellipsize(message.trim(), TITLE_MAX_CHARS)
}
