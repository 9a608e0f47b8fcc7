use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{
    provider::utils, BackendError, BackendResult, ChatBackend, ChatRequest, ChatResponse,
    HealthStatus,
};

/// reqwest client for the assistant backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend client; `timeout` bounds each request end to end
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::Config("backend URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taxbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());

        Err(BackendError::Status {
            status: status.as_u16(),
            body: utils::extract_error_message(&body),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, request: ChatRequest) -> BackendResult<ChatResponse> {
        let url = self.url("/chat");

        debug!(
            url = %url,
            history_len = request.conversation_history.len(),
            "Sending chat request"
        );

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let chat_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;

        debug!(
            sections = chat_response.relevant_sections.len(),
            articles = chat_response.relevant_articles.len(),
            "Chat response received"
        );

        Ok(chat_response)
    }

    async fn health(&self) -> BackendResult<HealthStatus> {
        let url = self.url("/health");
        debug!("Checking backend health at: {}", url);

        let response = self.client.get(&url).send().await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
