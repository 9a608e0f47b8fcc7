//! Durable storage of the session list
//!
//! The whole list lives under one key and is replaced on every save. The
//! document is versioned; the unversioned array written by the browser
//! client is still accepted on read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::Session;

/// Current layout of the persisted document
pub const HISTORY_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to (de)serialize session history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unsupported session history version {0}")]
    UnsupportedVersion(u32),
}

/// Where the session list is kept between runs
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the persisted list. Missing or unreadable data yields an empty
    /// list; the failure is logged, never returned.
    async fn load_all(&self) -> Vec<Session>;

    /// Replace the persisted list with `sessions`
    async fn save_all(&self, sessions: &[Session]) -> Result<(), StoreError>;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct HistoryDocumentRef<'a> {
    version: u32,
    sessions: &'a [Session],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredHistory {
    Versioned { version: u32, sessions: Vec<Session> },
    Unversioned(Vec<Session>),
}

/// Serialize the full list into the current document layout
pub fn encode_sessions(sessions: &[Session]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&HistoryDocumentRef {
        version: HISTORY_VERSION,
        sessions,
    })?)
}

/// Parse a stored document in either layout
pub fn decode_sessions(payload: &str) -> Result<Vec<Session>, StoreError> {
    match serde_json::from_str(payload)? {
        StoredHistory::Versioned { version, sessions } if version == HISTORY_VERSION => Ok(sessions),
        StoredHistory::Versioned { version, .. } => Err(StoreError::UnsupportedVersion(version)),
        StoredHistory::Unversioned(sessions) => Ok(sessions),
    }
}

/// Decode a raw payload, treating blank or broken data as no history
fn hydrate(payload: Option<&str>, location: &str) -> Vec<Session> {
    let payload = match payload {
        Some(payload) if !payload.trim().is_empty() => payload,
        _ => {
            debug!("No saved sessions at {}", location);
            return Vec::new();
        }
    };

    match decode_sessions(payload) {
        Ok(sessions) => {
            debug!("Loaded {} sessions from {}", sessions.len(), location);
            sessions
        }
        Err(e) => {
            warn!(location = %location, error = %e, "Discarding unreadable session history");
            Vec::new()
        }
    }
}

/// Session list stored as a JSON file named after the storage key
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load_all(&self) -> Vec<Session> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => hydrate(Some(&content), &self.describe()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => hydrate(None, &self.describe()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session history");
                Vec::new()
            }
        }
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let payload = encode_sessions(sessions)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        // Write beside the target and rename so readers never see half a file
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Saved {} sessions to {}", sessions.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Session list kept in process memory; nothing survives the run
#[derive(Default)]
pub struct MemoryStore {
    payload: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw stored payload
    #[cfg(test)]
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
            writes: AtomicUsize::new(0),
        }
    }

    /// The raw payload as last written
    pub fn payload(&self) -> Option<String> {
        self.payload.lock().ok().and_then(|payload| payload.clone())
    }

    /// Number of successful `save_all` calls
    #[cfg(test)]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_all(&self) -> Vec<Session> {
        hydrate(self.payload().as_deref(), &self.describe())
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let payload = encode_sessions(sessions)?;
        if let Ok(mut slot) = self.payload.lock() {
            *slot = Some(payload);
        }
        let count = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Kept {} sessions in memory (write #{})", sessions.len(), count);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
