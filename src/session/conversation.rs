//! The conversation controller
//!
//! Owns the displayed turns, the reduced history sent to the backend, the
//! active session id and the pending flag. Every change to a session is
//! written through to the store before the triggering call returns.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    app::AppEvent,
    backend::{ChatBackend, ChatRequest, HistoryEntry},
    session::{project_history, Session, SessionStore, StoreError, Turn},
};

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("No saved session with id {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a call to [`ConversationController::submit`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, or a request was already in flight
    Ignored,
    /// The backend answered
    Answered,
    /// The backend call failed; an apology turn was shown
    Failed,
}

pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn SessionStore>,
    event_tx: Option<mpsc::UnboundedSender<AppEvent>>,
    turns: Vec<Turn>,
    history: Vec<HistoryEntry>,
    sessions: Vec<Session>,
    active_session_id: Option<String>,
    pending: bool,
    persist_empty: bool,
}

impl ConversationController {
    /// Create a controller, hydrating the session list from `store`
    pub async fn new(backend: Arc<dyn ChatBackend>, store: Arc<dyn SessionStore>) -> Self {
        let sessions = store.load_all().await;
        info!(
            "Loaded {} saved sessions from {}",
            sessions.len(),
            store.describe()
        );

        Self {
            backend,
            store,
            event_tx: None,
            turns: Vec::new(),
            history: Vec::new(),
            sessions,
            active_session_id: None,
            pending: false,
            persist_empty: true,
        }
    }

    /// Report state changes on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Whether deleting the last session writes an empty list
    pub fn with_persist_empty(mut self, persist_empty: bool) -> Self {
        self.persist_empty = persist_empty;
        self
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Send `text` to the backend and record the exchange.
    ///
    /// Backend failures never surface as `Err`: they become an apology turn.
    /// The only error is a failed write to the session store, which happens
    /// after the turns are recorded and the pending flag is cleared.
    pub async fn submit(&mut self, text: &str) -> Result<SubmitOutcome, ConversationError> {
        let message = text.trim();
        if message.is_empty() || self.pending {
            debug!("Ignoring submit (blank: {}, pending: {})", message.is_empty(), self.pending);
            return Ok(SubmitOutcome::Ignored);
        }

        self.pending = true;
        let result = self.exchange(message.to_string()).await;
        self.pending = false;

        result
    }

    async fn exchange(&mut self, message: String) -> Result<SubmitOutcome, ConversationError> {
        self.turns.push(Turn::user(message.clone()));

        let mut history = self.history.clone();
        history.push(HistoryEntry::user(message.clone()));

        self.emit(AppEvent::MessageSent {
            session_id: self.active_session_id.clone(),
            history_len: history.len(),
        });

        let request = ChatRequest {
            message: message.clone(),
            conversation_history: history.clone(),
        };

        let response = match self.backend.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(transport = e.is_transport(), "Chat request failed: {}", e);
                self.turns.push(Turn::apology());
                self.emit(AppEvent::RequestFailed {
                    error: e.to_string(),
                });
                return Ok(SubmitOutcome::Failed);
            }
        };

        history.push(HistoryEntry::assistant(response.response.clone()));
        self.emit(AppEvent::MessageReceived {
            session_id: self.active_session_id.clone(),
            sections: response.relevant_sections.len(),
            articles: response.relevant_articles.len(),
        });

        self.turns.push(Turn::from_response(response));
        self.history = history;

        self.record_session(&message).await?;

        Ok(SubmitOutcome::Answered)
    }

    /// Create or update the active session from the current turns
    async fn record_session(&mut self, message: &str) -> Result<(), ConversationError> {
        match self.active_session_id.clone() {
            None => {
                let session = Session::new(message, self.turns.clone());
                info!("Created session {} \"{}\"", session.id, session.title);

                self.active_session_id = Some(session.id.clone());
                self.emit(AppEvent::SessionCreated {
                    session_id: session.id.clone(),
                    title: session.title.clone(),
                });
                self.sessions.insert(0, session);
            }
            Some(id) => match self.sessions.iter_mut().find(|session| session.id == id) {
                Some(session) => {
                    session.replace_messages(self.turns.clone());
                    let turn_count = session.messages.len();
                    self.emit(AppEvent::SessionUpdated {
                        session_id: id,
                        turn_count,
                    });
                }
                None => {
                    debug!("Active session {} is no longer in the list", id);
                    return Ok(());
                }
            },
        }

        self.persist().await
    }

    /// Forget the active conversation; saved sessions are untouched
    pub fn clear(&mut self) {
        self.turns.clear();
        self.history.clear();
        self.active_session_id = None;
        self.emit(AppEvent::ConversationCleared);
    }

    /// Make a saved session the active conversation
    pub fn load_session(&mut self, id: &str) -> Result<(), ConversationError> {
        let session = self
            .session(id)
            .ok_or_else(|| ConversationError::UnknownSession(id.to_string()))?;

        let turns = session.messages.clone();
        let history = project_history(&turns);
        debug!(
            "Loading session {} ({} turns, {} history entries)",
            id,
            turns.len(),
            history.len()
        );

        self.turns = turns;
        self.history = history;
        self.active_session_id = Some(id.to_string());
        self.emit(AppEvent::SessionLoaded {
            session_id: id.to_string(),
        });

        Ok(())
    }

    /// Delete a saved session, clearing the conversation if it was active.
    ///
    /// Returns `false` when no session has that id.
    pub async fn delete_session(&mut self, id: &str) -> Result<bool, ConversationError> {
        let Some(index) = self.sessions.iter().position(|session| session.id == id) else {
            return Ok(false);
        };

        self.sessions.remove(index);
        info!("Deleted session {}", id);
        self.emit(AppEvent::SessionDeleted {
            session_id: id.to_string(),
        });

        if self.active_session_id.as_deref() == Some(id) {
            self.clear();
        }

        self.persist().await?;
        Ok(true)
    }

    async fn persist(&self) -> Result<(), ConversationError> {
        if self.sessions.is_empty() && !self.persist_empty {
            debug!("Session list is empty, skipping write");
            return Ok(());
        }

        self.store.save_all(&self.sessions).await?;
        Ok(())
    }

    fn emit(&self, event: AppEvent) {
        if let Some(event_tx) = &self.event_tx {
            let _ = event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, BackendResult, ChatResponse, HealthStatus, Role, SectionMatch,
    };
    use crate::session::{MemoryStore, APOLOGY_TEXT};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that replays scripted replies and records every request
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<BackendResult<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn with_replies(replies: Vec<BackendResult<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, request: ChatRequest) -> BackendResult<ChatResponse> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Decode("no scripted reply".to_string())))
        }

        async fn health(&self) -> BackendResult<HealthStatus> {
            Ok(HealthStatus {
                status: "healthy".to_string(),
                agent_loaded: true,
            })
        }

        fn base_url(&self) -> &str {
            "http://scripted"
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore;

    #[async_trait]
    impl SessionStore for ReadOnlyStore {
        async fn load_all(&self) -> Vec<Session> {
            Vec::new()
        }

        async fn save_all(&self, _sessions: &[Session]) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "read-only".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn describe(&self) -> String {
            "read-only".to_string()
        }
    }

    fn reply(text: &str) -> BackendResult<ChatResponse> {
        Ok(ChatResponse {
            response: text.to_string(),
            relevant_sections: Vec::new(),
            relevant_articles: Vec::new(),
            confidence: None,
            status: None,
        })
    }

    fn section_80c_reply() -> BackendResult<ChatResponse> {
        Ok(ChatResponse {
            response: "Section 80C allows deductions up to 1.5 lakh.".to_string(),
            relevant_sections: vec![SectionMatch {
                section: "80C".to_string(),
                title: "Deductions".to_string(),
                summary: "Investments in specified instruments".to_string(),
                similarity_score: 0.92,
            }],
            relevant_articles: Vec::new(),
            confidence: Some(0.9),
            status: None,
        })
    }

    fn network_error() -> BackendResult<ChatResponse> {
        Err(BackendError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        })
    }

    async fn controller(
        backend: Arc<ScriptedBackend>,
        store: Arc<MemoryStore>,
    ) -> ConversationController {
        ConversationController::new(backend, store).await
    }

    #[tokio::test]
    async fn test_first_answer_creates_session() {
        let backend = ScriptedBackend::with_replies(vec![section_80c_reply()]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend.clone(), store.clone()).await;

        let outcome = conversation.submit("What is Section 80C?").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Answered);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "What is Section 80C?");
        assert_eq!(
            requests[0].conversation_history,
            vec![HistoryEntry::user("What is Section 80C?")]
        );

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].relevant_sections.len(), 1);
        assert_eq!(turns[1].confidence, Some(0.9));

        let sessions = conversation.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "What is Section 80C?");
        assert_eq!(sessions[0].messages, turns);
        assert_eq!(conversation.active_session_id(), Some(sessions[0].id.as_str()));
        assert!(!conversation.is_pending());

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.load_all().await, sessions);
    }

    #[tokio::test]
    async fn test_new_sessions_go_to_the_head_of_the_list() {
        let backend = ScriptedBackend::with_replies(vec![reply("a"), reply("b")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend, store).await;

        conversation.submit("first question").await.unwrap();
        conversation.clear();
        conversation.submit("second question").await.unwrap();

        let titles: Vec<&str> = conversation.sessions().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["second question", "first question"]);
    }

    #[tokio::test]
    async fn test_follow_up_sends_full_history_and_updates_session() {
        let backend = ScriptedBackend::with_replies(vec![reply("one"), reply("two")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend.clone(), store.clone()).await;

        conversation.submit("q1").await.unwrap();
        conversation.submit("  q2  ").await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests[1].message, "q2");
        assert_eq!(
            requests[1].conversation_history,
            vec![
                HistoryEntry::user("q1"),
                HistoryEntry::assistant("one"),
                HistoryEntry::user("q2"),
            ]
        );

        assert_eq!(conversation.sessions().len(), 1);
        assert_eq!(conversation.sessions()[0].messages.len(), 4);
        assert_eq!(conversation.history().len(), 4);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_long_question_title_is_truncated() {
        let backend = ScriptedBackend::with_replies(vec![reply("ok")]);
        let mut conversation = controller(backend, Arc::new(MemoryStore::new())).await;
        let question = "How are long term capital gains on listed equity shares taxed after the 2018 budget?";

        conversation.submit(question).await.unwrap();

        let title = &conversation.sessions()[0].title;
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 53);
        assert!(question.starts_with(title.trim_end_matches("...")));
    }

    #[tokio::test]
    async fn test_backend_failure_shows_apology_and_leaves_sessions_alone() {
        let backend = ScriptedBackend::with_replies(vec![network_error()]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend, store.clone()).await;

        let outcome = conversation.submit("What is Section 80C?").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Failed);

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].error);
        assert_eq!(turns[1].content, APOLOGY_TEXT);

        assert!(conversation.history().is_empty());
        assert!(conversation.sessions().is_empty());
        assert!(conversation.active_session_id().is_none());
        assert!(!conversation.is_pending());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_exchange_is_not_resent() {
        let backend = ScriptedBackend::with_replies(vec![network_error(), reply("answer")]);
        let mut conversation = controller(backend.clone(), Arc::new(MemoryStore::new())).await;

        conversation.submit("lost question").await.unwrap();
        conversation.submit("retry question").await.unwrap();

        let requests = backend.requests();
        assert_eq!(
            requests[1].conversation_history,
            vec![HistoryEntry::user("retry question")]
        );
        // Display keeps everything, including the apology
        assert_eq!(conversation.turns().len(), 4);
        assert_eq!(conversation.sessions()[0].messages.len(), 4);
        assert_eq!(conversation.sessions()[0].title, "retry question");
    }

    #[tokio::test]
    async fn test_blank_or_pending_submit_is_ignored() {
        let backend = ScriptedBackend::with_replies(vec![reply("never")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend.clone(), store.clone()).await;

        assert_eq!(conversation.submit("").await.unwrap(), SubmitOutcome::Ignored);
        assert_eq!(conversation.submit(" \n\t ").await.unwrap(), SubmitOutcome::Ignored);

        conversation.pending = true;
        assert_eq!(conversation.submit("real question").await.unwrap(), SubmitOutcome::Ignored);
        assert!(conversation.is_pending());

        assert!(conversation.turns().is_empty());
        assert!(conversation.history().is_empty());
        assert!(conversation.sessions().is_empty());
        assert!(backend.requests().is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_cleared_when_store_write_fails() {
        let backend = ScriptedBackend::with_replies(vec![reply("answer")]);
        let mut conversation = ConversationController::new(backend, Arc::new(ReadOnlyStore)).await;

        let result = conversation.submit("question").await;

        assert!(matches!(result, Err(ConversationError::Store(_))));
        assert!(!conversation.is_pending());
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_load_session_restores_history_prefix() {
        let backend = ScriptedBackend::with_replies(vec![
            section_80c_reply(),
            reply("Up to 1.5 lakh."),
            reply("Yes, ELSS qualifies."),
        ]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend.clone(), store.clone()).await;

        conversation.submit("What is Section 80C?").await.unwrap();
        conversation.submit("What is the limit?").await.unwrap();
        let live_history = conversation.history().to_vec();
        let id = conversation.active_session_id().unwrap().to_string();

        // A fresh run hydrates from the store
        let mut resumed = controller(backend.clone(), store.clone()).await;
        resumed.load_session(&id).unwrap();
        assert_eq!(resumed.active_session_id(), Some(id.as_str()));
        assert_eq!(resumed.history(), live_history.as_slice());

        resumed.submit("Does ELSS count?").await.unwrap();

        let last = backend.requests().pop().unwrap();
        let mut expected = live_history.clone();
        expected.push(HistoryEntry::user("Does ELSS count?"));
        assert_eq!(last.conversation_history, expected);

        // Still one session, now with six turns
        assert_eq!(resumed.sessions().len(), 1);
        assert_eq!(resumed.sessions()[0].messages.len(), 6);
    }

    #[tokio::test]
    async fn test_load_unknown_session_changes_nothing() {
        let backend = ScriptedBackend::with_replies(vec![reply("a")]);
        let mut conversation = controller(backend, Arc::new(MemoryStore::new())).await;
        conversation.submit("q").await.unwrap();
        let before = conversation.turns().to_vec();

        let err = conversation.load_session("missing").unwrap_err();

        assert!(matches!(err, ConversationError::UnknownSession(_)));
        assert_eq!(conversation.turns(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_active_session_clears_conversation() {
        let backend = ScriptedBackend::with_replies(vec![reply("a")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend, store.clone()).await;
        conversation.submit("q").await.unwrap();
        let id = conversation.active_session_id().unwrap().to_string();

        assert!(conversation.delete_session(&id).await.unwrap());

        assert!(conversation.turns().is_empty());
        assert!(conversation.history().is_empty());
        assert!(conversation.active_session_id().is_none());
        assert!(conversation.sessions().is_empty());
        // The empty list is written through
        assert!(store.load_all().await.is_empty());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_other_session_keeps_conversation() {
        let backend = ScriptedBackend::with_replies(vec![reply("a"), reply("b")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend, store.clone()).await;

        conversation.submit("older").await.unwrap();
        let older = conversation.active_session_id().unwrap().to_string();
        conversation.clear();
        conversation.submit("newer").await.unwrap();
        let newer = conversation.active_session_id().unwrap().to_string();

        assert!(conversation.delete_session(&older).await.unwrap());

        assert_eq!(conversation.active_session_id(), Some(newer.as_str()));
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(store.load_all().await.len(), 1);
        assert!(!conversation.delete_session("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_list_not_written_when_disabled() {
        let backend = ScriptedBackend::with_replies(vec![reply("a")]);
        let store = Arc::new(MemoryStore::new());
        let mut conversation = controller(backend, store.clone())
            .await
            .with_persist_empty(false);
        conversation.submit("q").await.unwrap();
        let id = conversation.active_session_id().unwrap().to_string();

        conversation.delete_session(&id).await.unwrap();

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.load_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_saved_sessions() {
        let backend = ScriptedBackend::with_replies(vec![reply("a")]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut conversation = controller(backend, Arc::new(MemoryStore::new()))
            .await
            .with_events(event_tx);

        conversation.submit("q").await.unwrap();
        conversation.clear();

        assert!(conversation.turns().is_empty());
        assert_eq!(conversation.sessions().len(), 1);

        let mut events = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], AppEvent::MessageSent { session_id: None, history_len: 1 }));
        assert!(matches!(events[1], AppEvent::MessageReceived { .. }));
        assert!(matches!(events[2], AppEvent::SessionCreated { .. }));
        assert!(matches!(events[3], AppEvent::ConversationCleared));
    }
}
