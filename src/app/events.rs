//! Application events for the event-driven architecture

use serde::{Deserialize, Serialize};

/// Events emitted as the conversation state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A new session was created after its first answer
    SessionCreated {
        session_id: String,
        title: String,
    },

    /// A session's turns were replaced
    SessionUpdated {
        session_id: String,
        turn_count: usize,
    },

    /// A saved session became the active conversation
    SessionLoaded {
        session_id: String,
    },

    /// A session was deleted
    SessionDeleted {
        session_id: String,
    },

    /// A question was sent to the backend
    MessageSent {
        session_id: Option<String>,
        history_len: usize,
    },

    /// An answer was received from the backend
    MessageReceived {
        session_id: Option<String>,
        sections: usize,
        articles: usize,
    },

    /// The backend call failed and an apology was shown instead
    RequestFailed {
        error: String,
    },

    /// The active conversation was reset
    ConversationCleared,

    /// Application is shutting down
    Shutdown,
}
