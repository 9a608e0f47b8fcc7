//! Backend trait and shared helpers

use async_trait::async_trait;

use crate::backend::{BackendResult, ChatRequest, ChatResponse, HealthStatus};

/// The assistant backend as seen by the conversation controller
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one chat request and wait for the full answer
    async fn chat(&self, request: ChatRequest) -> BackendResult<ChatResponse>;

    /// Query the backend's health endpoint
    async fn health(&self) -> BackendResult<HealthStatus>;

    /// Base URL requests are sent to
    fn base_url(&self) -> &str;
}

/// Utility functions for backend implementations
pub mod utils {
    /// Extract a readable error message from a failed response body.
    ///
    /// The backend reports failures as `{"detail": "..."}`.
    pub fn extract_error_message(body: &str) -> String {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            match json.get("detail") {
                Some(serde_json::Value::String(detail)) => return detail.clone(),
                Some(other) => return other.to_string(),
                None => {}
            }
        }

        if body.trim().is_empty() {
            "empty response body".to_string()
        } else {
            body.trim().to_string()
        }
    }

    /// Sanitize content for safe display
    pub fn sanitize_content(content: &str) -> String {
        content
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }

}
