//! Error types for the assistant backend

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Http(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
