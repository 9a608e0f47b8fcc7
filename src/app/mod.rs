//! Core application logic and orchestration
//!
//! This module wires the configuration, the backend client, the session
//! store and the conversation controller together, and runs the event loop
//! that logs what the controller does.

mod events;

pub use events::*;

use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{ChatBackend, HttpBackend},
    config::Config,
    session::{ConversationController, JsonFileStore, MemoryStore, SessionStore},
};

/// Main application structure
pub struct App {
    backend: Arc<dyn ChatBackend>,
    controller: ConversationController,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    event_loop: Option<JoinHandle<()>>,
}

impl App {
    /// Create a new application instance.
    ///
    /// With `ephemeral` set, sessions live in memory only and nothing is
    /// read from or written to the data directory.
    pub async fn new(config: Config, ephemeral: bool) -> Result<Self> {
        debug!("Creating new App instance");

        let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?);

        let store: Arc<dyn SessionStore> = if ephemeral {
            info!("Running without persistent session history");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(JsonFileStore::new(config.history_path()))
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = ConversationController::new(backend.clone(), store)
            .await
            .with_events(event_tx.clone())
            .with_persist_empty(config.persist_empty_history);

        let mut app = App {
            backend,
            controller,
            event_tx,
            shutdown_tx: None,
            event_loop: None,
        };
        app.start_event_loop(event_rx);

        Ok(app)
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ConversationController {
        &mut self.controller
    }

    /// Start the application event loop
    fn start_event_loop(&mut self, mut event_rx: mpsc::UnboundedReceiver<AppEvent>) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        self.event_loop = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = event_rx.recv() => {
                        if let Err(e) = Self::handle_event(event) {
                            error!("Error handling event: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        // Drain events queued ahead of the signal
                        while let Ok(event) = event_rx.try_recv() {
                            let _ = Self::handle_event(event);
                        }
                        debug!("Shutting down event loop");
                        break;
                    }
                }
            }
        }));
    }

    /// Handle application events
    fn handle_event(event: AppEvent) -> Result<()> {
        match event {
            AppEvent::SessionCreated { session_id, title } => {
                info!("Session created: {} ({})", session_id, title);
            }
            AppEvent::SessionUpdated { session_id, turn_count } => {
                debug!("Session updated: {} ({} turns)", session_id, turn_count);
            }
            AppEvent::SessionLoaded { session_id } => {
                debug!("Session loaded: {}", session_id);
            }
            AppEvent::SessionDeleted { session_id } => {
                info!("Session deleted: {}", session_id);
            }
            AppEvent::MessageSent { session_id, history_len } => {
                debug!(
                    "Message sent in session {}: {} history entries",
                    session_id.as_deref().unwrap_or("<new>"),
                    history_len
                );
            }
            AppEvent::MessageReceived { session_id, sections, articles } => {
                debug!(
                    "Answer received in session {}: {} sections, {} articles",
                    session_id.as_deref().unwrap_or("<new>"),
                    sections,
                    articles
                );
            }
            AppEvent::RequestFailed { error } => {
                warn!("Backend request failed: {}", error);
            }
            AppEvent::ConversationCleared => {
                debug!("Conversation cleared");
            }
            AppEvent::Shutdown => {
                info!("Application shutdown requested");
            }
        }

        Ok(())
    }

    /// Shutdown the application gracefully
    pub async fn shutdown(&mut self) -> Result<()> {
        debug!("Shutting down application");

        if self.controller.is_pending() {
            warn!("Shutting down with a backend request still in flight");
        }

        let _ = self.event_tx.send(AppEvent::Shutdown);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.await?;
        }

        Ok(())
    }
}
