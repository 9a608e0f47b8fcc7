//! Conversation state and session persistence
//!
//! This module provides the turn and session model, the store the session
//! list is persisted to, and the controller that drives a conversation
//! against the backend.

mod session;
mod conversation;
pub mod store;

pub use session::*;
pub use conversation::*;
pub use store::{JsonFileStore, MemoryStore, SessionStore, StoreError};
